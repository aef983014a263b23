use std::ops::Range;
use std::path::Path;

use log::debug;
use plotters::prelude::*;
use symdiff::Session;
use symdiff::compute::RealFunction;
use symdiff::eval::EvalResult;
use symdiff_utils::derivative_label;

pub struct Plot2DOptions {
    pub range: Range<f64>,
    pub samples: usize,
    pub size: (u32, u32),
    pub caption: String,
}

impl Default for Plot2DOptions {
    fn default() -> Self {
        Self {
            range: -5.0..5.0,
            samples: 1000,
            size: (960, 720),
            caption: "symdiff plot".to_owned(),
        }
    }
}

/// Largest |y| drawn; the padded y range stays finite below it
pub const MAX_MAGNITUDE: f64 = 1e300;

fn drawable(y: f64) -> bool {
    y.is_finite() && y.abs() <= MAX_MAGNITUDE
}

/// Evenly spaced samples over the range, `None` where the function is not finite or exceeds
/// [`MAX_MAGNITUDE`].
pub fn sample(func: &RealFunction, opts: &Plot2DOptions) -> EvalResult<Vec<Option<(f64, f64)>>> {
    let steps = opts.samples.max(2) - 1;
    let width = opts.range.end - opts.range.start;
    (0..=steps)
        .map(|i| {
            let x = opts.range.start + width * i as f64 / steps as f64;
            let y = func.eval_point(x)?;
            Ok(drawable(y).then_some((x, y)))
        })
        .collect()
}

/// Smallest y range holding every drawable sample, padded by a tenth on each side.
pub fn y_bounds<'a>(samples: impl IntoIterator<Item = &'a Option<(f64, f64)>>) -> Range<f64> {
    let (low, high) = samples
        .into_iter()
        .flatten()
        .filter(|(_, y)| drawable(*y))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), &(_, y)| {
            (low.min(y), high.max(y))
        });
    if low > high {
        return -1.0..1.0;
    }
    let pad = if high - low < f64::EPSILON {
        (high.abs() / 10.0).max(1.0)
    } else {
        (high - low) / 10.0
    };
    (low - pad)..(high + pad)
}

pub fn plot_2d(
    path: &Path,
    funcs: &[(String, RealFunction)],
    opts: &Plot2DOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let sampled = funcs
        .iter()
        .map(|(label, func)| Ok((label, sample(func, opts)?)))
        .collect::<EvalResult<Vec<_>>>()?;
    let y_range = y_bounds(sampled.iter().flat_map(|(_, points)| points));

    let root = SVGBackend::new(path, opts.size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&opts.caption, ("sans-serif", 40).into_font())
        .margin(5)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(opts.range.clone(), y_range)?;
    chart.configure_mesh().draw()?;

    for (i, (label, points)) in sampled.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        // Non-finite samples split the curve into separate segments
        let segments = points
            .split(Option::is_none)
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.iter().flatten().copied().collect::<Vec<_>>());

        let mut labelled = false;
        for segment in segments {
            let series = chart.draw_series(LineSeries::new(segment, &color))?;
            if !labelled {
                series
                    .label(label.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
                labelled = true;
            }
        }
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    debug!("plotted {} functions to {}", funcs.len(), path.display());
    Ok(())
}

/// Labelled functions for the session's expression and the first `order` derivatives.
pub fn session_functions(
    session: &Session,
    order: usize,
) -> symdiff::Result<Vec<(String, RealFunction)>> {
    (0..=order.min(session.derivatives().len()))
        .map(|k| {
            let func = session.real_function(k)?;
            let var = func.variable_name().unwrap_or("x");
            Ok((format!("{}({var})", derivative_label("f", k)), func))
        })
        .collect()
}

/// Plots the expression of `session` together with every derivative it holds.
pub fn plot_session(
    path: &Path,
    session: &Session,
    opts: &Plot2DOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let funcs = session_functions(session, session.derivatives().len())?;
    plot_2d(path, &funcs, opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_skips_poles() {
        let mut session = Session::parse("5 / x").unwrap();
        session.differentiate("x", 1).unwrap();
        let func = session.real_function(0).unwrap();
        let opts = Plot2DOptions {
            range: -1.0..1.0,
            samples: 3,
            ..Default::default()
        };
        let points = sample(&func, &opts).unwrap();
        assert_eq!(points, [Some((-1.0, -5.0)), None, Some((1.0, 5.0))]);
        assert_eq!(y_bounds(&points), -6.0..6.0);
    }

    #[test]
    fn huge_values_keep_bounds_finite() {
        let points = [Some((0.0, f64::MAX)), Some((1.0, -f64::MAX)), Some((2.0, 1e300))];
        let bounds = y_bounds(&points);
        assert!(bounds.start.is_finite() && bounds.end.is_finite());
        assert!(bounds.start < 1e300 && bounds.end > 1e300);

        let mut session = Session::parse("10^x").unwrap();
        session.differentiate("x", 1).unwrap();
        let func = session.real_function(0).unwrap();
        let opts = Plot2DOptions {
            range: 298.0..302.0,
            samples: 3,
            ..Default::default()
        };
        let points = sample(&func, &opts).unwrap();
        assert_eq!(points[2], None);
        assert!(y_bounds(&points).end.is_finite());
    }

    #[test]
    fn flat_and_empty_bounds() {
        assert_eq!(y_bounds(&[Some((0.0, 2.0)), Some((1.0, 2.0))]), 1.0..3.0);
        assert_eq!(y_bounds(&[None, None]), -1.0..1.0);
    }

    #[test]
    fn labels_follow_derivative_order() {
        let mut session = Session::parse("t^3").unwrap();
        session.differentiate("t", 3).unwrap();
        let labels: Vec<_> = session_functions(&session, 5)
            .unwrap()
            .into_iter()
            .map(|(label, _)| label)
            .collect();
        assert_eq!(labels, ["f(t)", "f'(t)", "f''(t)", "f⁽³⁾(t)"]);
    }
}
