// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use console::style;

use crate::config::Config;

/// Prints every discovered page with its URL pattern.
pub fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    let working_dir = std::env::current_dir()?;
    let engine = super::build_engine(&config, &working_dir)?;

    let routes = engine.routes();
    if routes.is_empty() {
        println!(
            "{} No pages found in {}",
            style("!").yellow(),
            working_dir.join(engine.options().pages_root()).display()
        );
        return Ok(());
    }

    println!("{} route(s):", style(routes.len()).bold());
    for route in routes.routes() {
        println!(
            "  {:<32} {}",
            style(route.descriptor.url_pattern()).cyan(),
            route.descriptor.relative_path
        );
    }
    Ok(())
}
