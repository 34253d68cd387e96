use super::ui;
use crate::converter::{Conversion, ConversionEngine, parse_amount};
use anyhow::{Context, Result};

pub fn render(conversion: &Conversion) -> String {
    format!(
        "{:.2} {} = {} {}",
        conversion.amount,
        conversion.from,
        ui::style_text(&format!("{:.2}", conversion.result), ui::StyleType::Result),
        conversion.to
    )
}

/// Converts once. With `swap` the sides and amounts are exchanged before printing.
pub fn run(engine: &ConversionEngine, from: &str, to: &str, amount: &str, swap: bool) -> Result<()> {
    let amount = parse_amount(amount)?;
    let conversion = engine
        .conversion(from, to, amount)
        .with_context(|| format!("Cannot convert {from} to {to}"))?;
    let shown = if swap { conversion.swapped() } else { conversion };

    println!("{}", render(&shown));
    println!(
        "{}",
        ui::style_text(&ui::last_updated_label(shown.updated_at), ui::StyleType::Subtle)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CurrencyCode, RateRecord, RateTable, Rates};
    use std::sync::Arc;

    fn engine() -> ConversionEngine {
        let table = RateTable::new(RateRecord::base("US Dollar", CurrencyCode::new("USD").unwrap()));
        let jpy = RateRecord::new("Japanese Yen", 110.0, CurrencyCode::new("JPY").unwrap()).unwrap();
        table
            .initialize(Rates::from([(jpy.code.clone(), jpy)]))
            .unwrap();
        ConversionEngine::new(Arc::new(table))
    }

    #[test]
    fn test_render() {
        let conversion = engine().conversion("USD", "JPY", 10.0).unwrap();
        let output = console::strip_ansi_codes(&render(&conversion)).to_string();
        assert_eq!(output, "10.00 USD = 1100.00 JPY");
    }

    #[test]
    fn test_run_reports_bad_input() {
        let engine = engine();
        assert!(run(&engine, "USD", "JPY", "10", false).is_ok());
        assert!(run(&engine, "USD", "JPY", "10", true).is_ok());

        let err = run(&engine, "USD", "JPY", "ten", false).unwrap_err();
        assert_eq!(err.to_string(), "Invalid amount: ten");

        let err = run(&engine, "USD", "GBP", "10", false).unwrap_err();
        assert_eq!(err.to_string(), "Cannot convert USD to GBP");
        assert_eq!(err.root_cause().to_string(), "Currency not found: GBP");
    }
}
