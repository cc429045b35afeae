use crate::cli::ui;
use crate::core::gold;
use crate::service::ExchangeRateService;
use anyhow::Result;
use comfy_table::Cell;

/// Fetches and prints the rate table for the given codes (the whole catalog
/// when none are given).
pub async fn run(service: &ExchangeRateService, codes: &[String]) -> Result<()> {
    let requested: Vec<String> = if codes.is_empty() {
        let mut all: Vec<String> = service.catalog().keys().cloned().collect();
        all.sort();
        all
    } else {
        codes.to_vec()
    };

    let result = service.get_rates(&requested).await?;

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Name"),
        ui::header_cell("USD Value"),
        ui::header_cell("Gold (g)"),
        ui::header_cell("Source"),
    ]);

    let mut rows: Vec<&String> = result
        .usd_rates
        .keys()
        .chain(result.not_found.iter())
        .collect();
    rows.sort();
    rows.dedup();

    for code in rows {
        let name = service
            .catalog()
            .get(code)
            .map_or_else(|| code.clone(), |spec| spec.name.clone());
        let usd = result.usd_value(code);
        let grams = usd.map(|v| gold::gold_value(v, result.gold_price_usd));

        let source = if result.from_cache.contains(code) {
            "cache"
        } else if result.newly_fetched.contains(code) {
            "fetched"
        } else {
            "unavailable"
        };

        table.add_row(vec![
            Cell::new(code),
            Cell::new(&name),
            ui::format_optional_cell(usd, |v| format!("{v:.6}")),
            ui::format_optional_cell(grams.filter(|g| *g > 0.0), |g| format!("{g:.6}")),
            Cell::new(source),
        ]);
    }

    println!("{table}");

    if result.gold_price_usd > 0.0 {
        println!(
            "\n{} {}",
            ui::style_text("Gold spot (USD/g):", ui::StyleType::TotalLabel),
            ui::style_text(
                &format!("{:.4}", result.gold_price_usd),
                ui::StyleType::TotalValue
            )
        );
    }

    for error in &result.errors {
        println!("{}", ui::style_text(error, ui::StyleType::Error));
    }

    Ok(())
}
