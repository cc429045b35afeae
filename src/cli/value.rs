use crate::cli::ui;
use crate::convert::{self, MonetaryEntry};
use crate::service::ExchangeRateService;
use anyhow::{Context, Result};
use comfy_table::Cell;
use std::collections::BTreeSet;

/// Reads a YAML list of monetary entries, converts them into the base
/// currency and prints the total plus whatever could not be converted.
pub async fn run(service: &ExchangeRateService, path: &str) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read entries file: {path}"))?;
    let entries: Vec<MonetaryEntry> = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse entries file: {path}"))?;

    let codes: Vec<String> = entries
        .iter()
        .map(|e| e.currency.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let rates = service.get_rates(&codes).await?;
    let base = service.base_currency();
    let outcome = convert::convert(&entries, base, &rates, service.catalog());

    println!(
        "{} {}",
        ui::style_text(&format!("Total ({base}):"), ui::StyleType::TotalLabel),
        ui::style_text(&format!("{:.2}", outcome.total), ui::StyleType::TotalValue)
    );

    if !outcome.extra.is_empty() {
        println!(
            "\n{}",
            ui::style_text("Could not be converted:", ui::StyleType::Title)
        );

        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Currency"),
            ui::header_cell("Code"),
            ui::header_cell("Amount"),
        ]);

        let mut extras: Vec<_> = outcome.extra.values().collect();
        extras.sort_by(|a, b| a.code.cmp(&b.code));
        for extra in extras {
            table.add_row(vec![
                Cell::new(&extra.name),
                Cell::new(&extra.code),
                Cell::new(format!("{:.2}", extra.total)),
            ]);
        }
        println!("{table}");
    }

    for error in &rates.errors {
        println!("{}", ui::style_text(error, ui::StyleType::Error));
    }

    Ok(())
}
