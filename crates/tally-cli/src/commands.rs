use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use tally_state::{LoadReport, Root, StateDefinition, StoreConfig};
use tokio::sync::watch;
use tracing::info;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Dump(args) => cmd_dump(args),
        Command::Check(args) => cmd_check(args),
    }
}

/// Build the root from the configuration and register every defined entry.
fn open_root(args: &StoreArgs) -> anyhow::Result<(Arc<Root>, Vec<String>)> {
    let mut config = match &args.config {
        Some(path) => StoreConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => StoreConfig::default(),
    };
    if let Some(base) = &args.base_path {
        config.base_path = base.clone();
    }

    let defs = StateDefinition::from_file(&args.defs)
        .with_context(|| format!("loading definitions from {}", args.defs.display()))?;
    let root = Arc::new(Root::new(config));
    let names = defs.register(&mut root.lock())?;
    Ok((root, names))
}

fn print_errors(report: &LoadReport) {
    for (path, err) in &report.errors {
        eprintln!("  {} {}: {}", "error:".red().bold(), path.display(), err);
    }
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let (root, names) = open_root(&args.store)?;
    let report = root.load_saved_configs();
    print_errors(&report);
    println!(
        "{} {} entries, {} files loaded from {}",
        "✓".green().bold(),
        names.len(),
        report.loaded.len(),
        root.config().config_root().display().to_string().bold()
    );

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(async move {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(Arc::clone(&root).save_loop(rx));

        tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
        info!(revision = root.revision(), "shutting down");
        // The loop may already be gone; the join below reports that.
        let _ = shutdown.send(true);
        task.await.context("save loop failed")?;
        anyhow::Ok(())
    })
}

/// JSON text for one entry, or every entry.
fn render_dump(root: &Root, name: Option<&str>, persisted: bool) -> anyhow::Result<String> {
    let state = root.lock();
    let json = match name {
        Some(name) => {
            let id = state
                .get(name)
                .with_context(|| format!("no entry named {name:?}"))?;
            state.to_json(id, persisted)?
        }
        None => state.root_json(persisted)?,
    };
    Ok(json.to_json(true))
}

fn cmd_dump(args: DumpArgs) -> anyhow::Result<()> {
    let (root, _) = open_root(&args.store)?;
    let report = root.load_saved_configs();
    print_errors(&report);
    println!("{}", render_dump(&root, args.name.as_deref(), args.persisted)?);
    Ok(())
}

fn cmd_check(args: CheckArgs) -> anyhow::Result<()> {
    let (root, names) = open_root(&args.store)?;
    let report = root.load_saved_configs();
    for path in &report.loaded {
        println!("  {} {}", "ok".green(), path.display());
    }
    print_errors(&report);

    if !report.is_ok() {
        let total = report.loaded.len() + report.errors.len();
        anyhow::bail!("{} of {} files failed to load", report.errors.len(), total);
    }
    println!("{} {} entries, {} files loaded", "✓".green().bold(), names.len(), report.loaded.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const DEFS: &str = r#"[
        {"Name": "Settings", "Root": "Settings", "StateType": "Object", "Fields": [
            {"Name": "Title", "StateType": "String"},
            {"Name": "Period", "StateType": "Number"}
        ]},
        {"Name": "Tags", "Root": "Tags", "StateType": "Array", "ChildType": "String"}
    ]"#;

    fn store_args(dir: &Path) -> StoreArgs {
        let defs = dir.join("defs.json");
        std::fs::write(&defs, DEFS).unwrap();
        StoreArgs {
            defs,
            config: None,
            base_path: Some(dir.to_path_buf()),
        }
    }

    #[test]
    fn open_registers_entries() {
        let dir = tempfile::tempdir().unwrap();
        let (root, names) = open_root(&store_args(dir.path())).unwrap();
        assert_eq!(names, ["Settings", "Tags"]);
        assert_eq!(root.config().base_path, dir.path());
    }

    #[test]
    fn dump_loaded_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config");
        std::fs::create_dir_all(&config).unwrap();
        std::fs::write(config.join("settings.json"), r#"{"Title": "main", "Period": "30"}"#).unwrap();

        let (root, _) = open_root(&store_args(dir.path())).unwrap();
        assert!(root.load_saved_configs().is_ok());

        let text = render_dump(&root, Some("Settings"), true).unwrap();
        assert_eq!(text, "{\n  \"Period\": 30,\n  \"Title\": \"main\"\n}");
        let all = render_dump(&root, None, false).unwrap();
        assert!(all.contains("\"Tags\": []"));
        assert!(render_dump(&root, Some("Nope"), false).is_err());
    }

    #[test]
    fn check_fails_on_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let args = store_args(dir.path());
        let config = dir.path().join("config");
        std::fs::create_dir_all(&config).unwrap();
        std::fs::write(config.join("tags.json"), r#"["a", "b"]"#).unwrap();
        assert!(cmd_check(CheckArgs { store: store_args(dir.path()) }).is_ok());

        std::fs::write(config.join("settings.json"), r#"{"Title": 1}"#).unwrap();
        assert!(cmd_check(CheckArgs { store: args }).is_err());
    }

    #[test]
    fn config_file_and_override() {
        let dir = tempfile::tempdir().unwrap();
        let toml = dir.path().join("tally.toml");
        std::fs::write(&toml, "base_path = \"/elsewhere\"\nconfig_dir = \"state\"\n").unwrap();
        let mut args = store_args(dir.path());
        args.config = Some(toml);
        let (root, _) = open_root(&args).unwrap();
        assert_eq!(root.config().base_path, dir.path());
        assert_eq!(root.config().config_dir, "state");
    }
}
