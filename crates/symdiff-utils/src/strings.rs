use itertools::Itertools;

const SUPER: &str = "⁰¹²³⁴⁵⁶⁷⁸⁹⁺⁻⁽⁾";
const NORMAL: &str = "0123456789+-()";

pub fn raise_superscript(s: &str) -> String {
    let mut new = s.to_owned();
    for (sd, d) in SUPER.chars().zip_eq(NORMAL.chars()) {
        new = new.replace(d, &sd.to_string());
    }
    new
}

/// `f`, `f'`, `f''`, then `f⁽³⁾` and up.
pub fn derivative_label(name: &str, order: usize) -> String {
    match order {
        0 => name.to_owned(),
        1 | 2 => format!("{name}{}", "'".repeat(order)),
        _ => format!("{name}{}", raise_superscript(&format!("({order})"))),
    }
}
