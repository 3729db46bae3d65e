use crate::{dual::Dual, r2::R2};

/// Fixed-precision rendering; non-negative numbers get a leading space so columns line up.
pub trait Fmt {
    fn s(&self, n: usize) -> String;
}

impl Fmt for f64 {
    fn s(&self, n: usize) -> String {
        let rendered = format!("{:.1$}", self, n);
        format!("{}{}", if rendered.starts_with('-') { "" } else { " " }, rendered)
    }
}

/// Space-separated components, no sign padding (the trace-file layout).
impl Fmt for R2<f64> {
    fn s(&self, n: usize) -> String {
        format!("{:.2$} {:.2$}", self.x, self.y, n)
    }
}

impl Fmt for Dual {
    fn s(&self, n: usize) -> String {
        format!("{}, vec![{}]", self.v().s(n), self.d().iter().map(|d| d.s(n)).collect::<Vec<String>>().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_non_negative() {
        assert_eq!(1.5.s(2), " 1.50");
        assert_eq!((-1.5).s(2), "-1.50");
        assert_eq!(R2 { x: 1., y: -0.25 }.s(5), "1.00000 -0.25000");
    }
}
