//-
// Copyright (c) 2020, Jason Lingle
// Copyright (c) 2026, The Evimail Developers
//
// This file is part of Evimail.
//
// Evimail is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Evimail is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Evimail. If not, see <http://www.gnu.org/licenses/>.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::error;
use structopt::StructOpt;

use crate::support::sysexits::*;
use crate::support::system_config::SystemConfig;

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
struct Options {
    /// The directory containing `evimail.toml` and the storage it names.
    #[structopt(long, parse(from_os_str), default_value = ".")]
    root: PathBuf,

    /// Log at debug level. Ignored if `logging.toml` exists in the root.
    #[structopt(short, long)]
    verbose: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
enum Command {
    Ingest(IngestSubcommand),
    /// Print the folder forest of a project as JSON.
    Tree(ProjectOptions),
    /// Print the contact network of a project as JSON.
    ///
    /// Only addresses that both sent mail to and received mail from another
    /// address appear in the network.
    Network(ProjectOptions),
    Export(ExportSubcommand),
}

#[derive(StructOpt)]
pub(super) struct ProjectOptions {
    /// The project the evidence belongs to.
    #[structopt(long, short)]
    pub(super) project: String,
}

/// Register an evidence container, store it, and ingest it.
///
/// The container is copied into the evidence store under its content hash.
/// Every folder becomes a node of the project's folder tree and every
/// message is published to the spool for indexing.
///
/// Supported formats are ZIP archives of `.eml` files and mbox files.
#[derive(StructOpt)]
pub(super) struct IngestSubcommand {
    #[structopt(flatten)]
    pub(super) common: ProjectOptions,

    /// The container to ingest.
    #[structopt(parse(from_os_str))]
    pub(super) file: PathBuf,
}

/// Export stored attachments into a ZIP archive.
///
/// Each attachment is named `<stem>-<attachment id><ext>` inside the archive.
/// Attachments which are listed on a message but were never stored are
/// reported and skipped.
#[derive(StructOpt)]
pub(super) struct ExportSubcommand {
    #[structopt(flatten)]
    pub(super) common: ProjectOptions,

    /// Only export attachments of messages in this folder or its
    /// descendants.
    #[structopt(long, short)]
    pub(super) folder: Option<String>,

    /// Only export attachments whose name ends with this extension,
    /// e.g. '.pdf'. Can be passed multiple times. '*' matches everything.
    #[structopt(long = "ext", short, number_of_values(1), default_value = "*")]
    pub(super) extensions: Vec<String>,

    /// Where to write the archive.
    #[structopt(parse(from_os_str))]
    pub(super) out: PathBuf,
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let options = Options::from_clap(&match Options::clap()
        .get_matches_safe()
    {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        },
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        },
    });

    let system_config = load_config(&options.root);
    init_logging(&options.root, options.verbose);

    let root = &options.root;
    let result = match options.command {
        Command::Ingest(cmd) => {
            super::commands::ingest(&system_config, root, cmd)
        },
        Command::Tree(cmd) => super::commands::tree(&system_config, root, cmd),
        Command::Network(cmd) => {
            super::commands::network(&system_config, root, cmd)
        },
        Command::Export(cmd) => {
            super::commands::export(&system_config, root, cmd)
        },
    };

    if let Err(e) = result {
        error!("{}", e);
        eprintln!("Error: {}", e);
        Sysexit::from(&e).exit();
    }
}

fn load_config(root: &Path) -> SystemConfig {
    let system_config_path = root.join("evimail.toml");
    let mut system_config_toml = Vec::new();
    if let Err(e) = fs::File::open(&system_config_path)
        .and_then(|mut f| f.read_to_end(&mut system_config_toml))
    {
        eprintln!("Error reading '{}': {}", system_config_path.display(), e);
        EX_CONFIG.exit();
    }

    match toml::from_slice(&system_config_toml) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Error in config file at '{}': {}",
                system_config_path.display(),
                e
            );
            EX_CONFIG.exit()
        },
    }
}

fn init_logging(root: &Path, verbose: bool) {
    let log_config_file = root.join("logging.toml");
    if log_config_file.is_file() {
        if let Err(e) = log4rs::init_file(
            &log_config_file,
            log4rs::file::Deserializers::new(),
        ) {
            eprintln!(
                "Error in logging config at '{}': {}",
                log_config_file.display(),
                e
            );
            EX_CONFIG.exit();
        }
        return;
    }

    use log4rs::append::console::{ConsoleAppender, Target};
    use log4rs::config::{Appender, Config, Root};
    use log4rs::encode::pattern::PatternEncoder;

    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(
            "{d(%H:%M:%S%.3f)} [{l}] {m}{n}",
        )))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level));

    match config {
        Ok(config) => {
            if let Err(e) = log4rs::init_config(config) {
                eprintln!("Failed to initialise logging: {}", e);
                EX_SOFTWARE.exit();
            }
        },
        Err(e) => {
            eprintln!("Failed to configure logging: {}", e);
            EX_SOFTWARE.exit();
        },
    }
}
