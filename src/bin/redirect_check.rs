use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use skillsite_edge::config;
use skillsite_edge::redirect::RedirectResolver;

/// Print what the edge would do with a request path.
#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config; built-in redirect tables are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Request path, optionally with a query string (e.g. "/categories/basic?page=2")
    #[arg(long, required = true)]
    path: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let redirects = match &args.config {
        Some(path) => config::load(Some(path.as_path()))?.redirects,
        None => config::Redirects::default(),
    };
    let resolver = RedirectResolver::new(&redirects);

    for raw in &args.path {
        let (path, query) = match raw.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (raw.as_str(), None),
        };
        println!("{} => {}", raw, resolver.resolve(path, query));
    }
    Ok(())
}
