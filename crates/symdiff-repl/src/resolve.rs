use std::io::{self, BufRead, Write};

use log::warn;
use symdiff::eval::Resolve;

const ATTEMPTS: usize = 5;
const FALLBACK: f64 = 0.0;

/// Asks for the value of each unbound variable on stdout and reads it from `input`.
pub struct Prompt<R> {
    input: R,
}

impl Prompt<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self {
            input: io::stdin().lock(),
        }
    }
}

impl<R: BufRead> Prompt<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    fn read_value(&mut self) -> Option<f64> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => line.trim().parse().ok(),
        }
    }
}

impl<R: BufRead> Resolve for Prompt<R> {
    fn resolve(&mut self, name: &str) -> f64 {
        for _ in 0..ATTEMPTS {
            print!("Input value of variable '{name}': ");
            // A failed flush only loses the prompt text
            let _ = io::stdout().flush();
            if let Some(value) = self.read_value() {
                return value;
            }
        }

        println!("No valid value for '{name}', using {FALLBACK}");
        warn!("resolving {name} failed {ATTEMPTS} times, defaulting to {FALLBACK}");
        FALLBACK
    }
}
