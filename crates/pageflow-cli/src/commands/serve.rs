// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP server command.

use console::style;

use crate::config::Config;
use crate::server;

/// Serves the project in the current directory. `host` and `port` override
/// the `[server]` table.
pub async fn run(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let working_dir = std::env::current_dir()?;
    let engine = super::build_engine(&config, &working_dir)?;

    println!(
        "{} {} ({} route(s))",
        style("Serving").cyan().bold(),
        config.project.name,
        engine.routes().len()
    );

    let static_dir = working_dir.join(&config.server.static_dir);
    let app = server::create_app(engine, static_dir.is_dir().then_some(static_dir.as_path()));

    let addr = format!(
        "{}:{}",
        host.unwrap_or(config.server.host),
        port.unwrap_or(config.server.port)
    );
    println!(
        "{} {}",
        style("Server running at").green().bold(),
        style(format!("http://{}", addr)).cyan().underlined()
    );
    println!("{}", style("Press Ctrl+C to stop").dim());

    server::serve(&addr, app).await
}
