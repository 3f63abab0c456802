//! Pageshim command line
//!
//! Runs a page script against the shim environment:
//!
//! ```text
//! pageshim <script.js> [page.html]
//! ```

use log::{error, info};
use pageshim::dom::Document;
use pageshim::host::NullStyleEngine;
use pageshim::js_engine::ScriptRuntime;
use pageshim::{Environment, NAME, ShimConfig, VERSION};
use std::env;
use std::fs;
use std::process;
use std::rc::Rc;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        None | Some("--help") | Some("-h") => {
            println!("{} v{}", NAME, VERSION);
            println!("usage: pageshim <script.js> [page.html]");
        }
        Some("--version") => println!("{} v{}", NAME, VERSION),
        Some(script) => {
            if let Err(e) = run(script, args.get(2).map(String::as_str)) {
                error!("{}", e);
                eprintln!("❌ {}", e);
                process::exit(1);
            }
        }
    }
}

fn run(script_path: &str, page_path: Option<&str>) -> pageshim::Result<()> {
    let config = ShimConfig::from_env()?;
    let document = match page_path {
        Some(path) => Document::parse_html(&fs::read_to_string(path)?),
        None => Document::new(),
    };
    let env = Environment::with_network(config, Rc::new(NullStyleEngine), document.into_shared())?;
    let mut runtime = ScriptRuntime::new(&env)?;

    let code = fs::read_to_string(script_path)?;
    info!("running {}", script_path);
    let result = runtime.execute(&code)?;
    println!("{}", result.to_js_string());

    if !runtime.run() {
        eprintln!("⚠️  requests still outstanding after the idle timeout");
    }
    Ok(())
}
