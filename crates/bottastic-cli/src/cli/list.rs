//! `bottastic list`: show the bot catalog.

use console::style;

use crate::catalog::BotCatalog;

pub fn list_bots(catalog: &BotCatalog) {
    println!();
    println!("  {}", style("Available bots").bold());
    println!();
    for entry in catalog.entries() {
        println!(
            "  {:<12} {}",
            style(entry.name).cyan(),
            style(entry.description).dim()
        );
    }
    println!();
    println!(
        "  Run one with {}",
        style("bottastic run <BOT> --simulate").yellow()
    );
    println!();
}
