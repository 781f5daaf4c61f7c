use anyhow::{Result, anyhow};
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tada::cli::{self, Command};
use tada::config::Config;
use tada::context::{AppContext, StandardContext};
use tada::controller::TadaController;
use tada::display;
use tada::storage::{LocalStorage, StateStorage};
use tada::vault::FsVault;

fn init_logging(level: log::LevelFilter) {
    // A second init (tests, embedding) is harmless.
    let _ = TermLogger::init(
        level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );
}

async fn item_id_at(
    controller: &TadaController<FsVault>,
    file_id: &str,
    index: usize,
) -> Result<String> {
    let store = controller.store.lock().await;
    let items = store
        .items_for_file(file_id)
        .ok_or_else(|| anyhow!("No checklist recorded for '{}', run scan first", file_id))?;
    items
        .get(index - 1)
        .map(|i| i.id.clone())
        .ok_or_else(|| anyhow!("'{}' has only {} item(s)", file_id, items.len()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let parsed = cli::parse_args(&args)?;

    if parsed.command == Command::Help {
        cli::print_help("tada");
        return Ok(());
    }

    let ctx = StandardContext::new(parsed.root);
    let config = Config::load_or_default(&ctx)?;
    init_logging(config.log_level_filter());

    let vault_root = match &parsed.command {
        Command::Scan { vault: Some(path) } => path.clone(),
        _ => config
            .vault_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    log::debug!("Vault: {:?}, state: {:?}", vault_root, ctx.get_state_path()?);

    let storage: Arc<dyn StateStorage> = Arc::new(LocalStorage::new(&ctx)?);
    let controller = TadaController::load(Arc::new(FsVault::new(vault_root)), storage.clone());

    match parsed.command {
        Command::Scan { .. } => {
            controller.refresh_all().await?;
            let store = controller.store.lock().await;
            print!("{}", display::render_panel(&store));
        }
        Command::Select { file_id, index } => {
            let item_id = item_id_at(&controller, &file_id, index).await?;
            if !controller.select_item(&file_id, &item_id).await? {
                println!("Already pinned.");
            }
        }
        Command::Deselect { file_id, index } => {
            let item_id = item_id_at(&controller, &file_id, index).await?;
            if !controller.deselect_item(&file_id, &item_id).await? {
                println!("Not pinned.");
            }
        }
        Command::Fold { file_id } => match controller.toggle_folded(&file_id).await? {
            Some(true) => println!("Folded {}.", display::file_label(&file_id)),
            Some(false) => println!("Unfolded {}.", display::file_label(&file_id)),
            None => println!("Nothing pinned in {}.", display::file_label(&file_id)),
        },
        Command::Export => {
            println!("{}", storage.load()?.unwrap_or_else(|| "{}".to_string()));
        }
        Command::Help => cli::print_help("tada"),
    }

    controller.shutdown().await
}
