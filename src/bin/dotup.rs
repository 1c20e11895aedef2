// SPDX-FileCopyrightText: 2022 Dmitry Gerasimov <di.gerasimov@gmail.com>
// SPDX-License-Identifier: MIT

use dotup::{
    git::SystemGit,
    installer::{Installer, InstallerError},
    item::{EditorFlavor, Item, RepoItem},
    manifest::Manifest,
    path::{default_manifest_path, home_dir},
    report::Reporter,
};

use anyhow::Result;
use clap::Parser;
use std::process::exit;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const INSTALL_FILES: &[&str] = &[
    ".aliases",
    ".config/fish/conf.d/00-path-common.fish",
    ".config/fish/conf.d/00-path-darwin.fish",
    ".config/fish/conf.d/50-env.fish",
    ".config/fish/conf.d/abbreviations-git.fish",
    ".config/fish/conf.d/abbreviations-other.fish",
    ".config/fish/conf.d/aliases.fish",
    ".config/fish/conf.d/toolbox-prompt-color.fish",
    ".config/fish/config.fish",
    ".config/fish/functions/compiledb_sailfish.fish",
    ".config/fish/functions/nemodeploy.fish",
    ".config/fish/functions/nemosetup.fish",
    ".config/nvim/filetype.vim",
    ".config/nvim/init.vim",
    ".mersdkrc",
    ".mersdkuburc",
    ".sbrules",
    ".scripts/avg-time",
    ".scripts/check-qml-ids",
    ".scripts/colors",
    ".tmux.conf",
    ".vimrc",
    ".zshrc",
];

/// Plugins pinned by exact commit. Bump deliberately.
const VIM_PLUGINS: &[(&str, &str)] = &[
    ("tpope/vim-commentary", "64a654ef4a20491104adba61712d6fdc0b132a26"),
    ("tpope/vim-surround", "3d188ed2113431cf8dac77be61b842acb64433d9"),
    ("ctrlpvim/ctrlp.vim", "7a1d5c2a1a9cef17f38618946d1b74ab5b4ed8a3"),
];

#[derive(Debug, Clone, Parser)]
#[command(about = "Install or update dotfiles.", version)]
struct Cli {
    /// Install files without asking for confirmation.
    #[arg(short = 'y', long)]
    pub non_interactive: bool,

    /// Show what would change without touching anything.
    #[arg(short = 'd', long)]
    pub dry_run: bool,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run(Cli::parse()) {
        match error.downcast_ref::<InstallerError>() {
            Some(InstallerError::NotATty) => {
                error!(
                    "cannot run interactive install while not at a tty; \
                     review the changes manually and run again with -y/--non-interactive"
                );
                exit(1);
            }
            Some(InstallerError::Cancelled) => {
                info!("no changes applied");
                exit(0);
            }
            _ => {
                error!("{error:?}");
                exit(1);
            }
        }
    }

    exit(0)
}

fn run(cli: Cli) -> Result<()> {
    let manifest = Manifest::load(default_manifest_path()?)?;
    let mut installer = Installer::new(
        home_dir()?,
        manifest,
        SystemGit::default(),
        Reporter::auto(),
    );

    installer.add_files(INSTALL_FILES.iter().copied(), "");
    for (name, revision) in VIM_PLUGINS {
        installer.add_item(Item::Repo(RepoItem::vim_plugin(
            name,
            *revision,
            EditorFlavor::Neovim,
        )));
    }

    if cli.dry_run {
        installer.preview()?;
        return Ok(());
    }

    installer.apply(!cli.non_interactive)?;

    Ok(())
}
