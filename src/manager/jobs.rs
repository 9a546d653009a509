// Worker bodies of the lifecycle jobs.
//
// Each function runs on a worker thread, may block on subprocesses, and
// reports through the returned Result. Store updates happen here, before the
// job's event is sent.

use super::{
    CloneBottleRequest, JobContext, ManagerError, NewBottleRequest, UpdateBottleRequest,
    bottle_config_of,
};
use crate::config::ConfigManager;
use crate::models::{BottleConfig, BottleRecord};
use crate::services::runner::WineCommand;
use camino::Utf8Path;
use regex::Regex;
use std::fs;
use std::io;
use std::sync::LazyLock;
use walkdir::WalkDir;

static UNINSTALLER_ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\{[0-9A-Fa-f-]+\})\|\|\|(.*)$").expect("Invalid uninstaller regex")
});

pub(super) fn refresh(ctx: &JobContext) -> Result<String, ManagerError> {
    let scan = ctx.scanner.rebuild().map_err(ManagerError::Config)?;
    let count = scan.bottles.len();
    ctx.state.replace_bottles(scan.bottles, scan.wine_version);
    Ok(format!("Found {} bottle(s)", count))
}

pub(super) fn create(ctx: &JobContext, request: NewBottleRequest) -> Result<String, ManagerError> {
    let prefixes_dir = ctx.scanner.prefixes_dir();
    fs::create_dir_all(prefixes_dir).map_err(|e| ManagerError::io(prefixes_dir, e))?;

    let prefix = ctx.scanner.prefix_for(&request.name);
    let mut init = WineCommand::new("wineboot")
        .arg("--init")
        .env("WINEARCH", request.bit.wine_arch());
    if request.disable_gecko_mono {
        init = init.env("WINEDLLOVERRIDES", "mscoree,mshtml=");
    }

    if let Err(e) = ctx.runner.run(&init, Some(&prefix)) {
        // The name was free before, so anything here is a half-built prefix
        if prefix.exists() {
            if let Err(cleanup) = fs::remove_dir_all(&prefix) {
                tracing::warn!("Failed to clean up {}: {}", prefix, cleanup);
            }
        }
        return Err(e.into());
    }

    // From here on the prefix exists and is kept even if a step fails
    let configured = configure_new_bottle(ctx, &prefix, &request);

    let record = ctx.scanner.probe(&prefix, &ctx.wine_version());
    match record {
        Ok(record) => {
            ctx.state.upsert_bottle(record);
        }
        Err(e) if configured.is_ok() => return Err(e.into()),
        Err(e) => tracing::warn!("Could not probe new bottle {}: {}", prefix, e),
    }

    configured.map(|_| format!("Bottle '{}' created", request.name))
}

fn configure_new_bottle(
    ctx: &JobContext,
    prefix: &Utf8Path,
    request: &NewBottleRequest,
) -> Result<(), ManagerError> {
    if request.disable_gecko_mono {
        remove_wine_mono(ctx, prefix)?;
    }

    winetricks(ctx, prefix, request.windows.winetricks_verb())?;
    if let Some(resolution) = &request.virtual_desktop {
        winetricks(ctx, prefix, &format!("vd={}", resolution))?;
    }
    winetricks(ctx, prefix, &format!("sound={}", request.audio.winetricks_value()))?;

    ConfigManager::save_bottle_config(prefix, &BottleConfig::default())
        .map_err(ManagerError::Config)
}

/// Uninstall every Wine Mono entry the prefix registered
fn remove_wine_mono(ctx: &JobContext, prefix: &Utf8Path) -> Result<(), ManagerError> {
    let list = WineCommand::new("wine").args(["uninstaller", "--list"]);
    let listing = ctx.runner.run(&list, Some(prefix))?;

    for guid in mono_uninstall_guids(&listing) {
        tracing::info!("Removing Wine Mono {} from {}", guid, prefix);
        ctx.runner.run(
            &WineCommand::new("wine").args(["uninstaller", "--remove", guid]),
            Some(prefix),
        )?;
    }
    Ok(())
}

/// GUIDs of Wine Mono entries in `wine uninstaller --list` output
pub(super) fn mono_uninstall_guids(listing: &str) -> Vec<&str> {
    listing
        .lines()
        .filter_map(|line| UNINSTALLER_ENTRY_RE.captures(line.trim()))
        .filter(|caps| caps[2].contains("Wine Mono"))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

fn winetricks(ctx: &JobContext, prefix: &Utf8Path, verb: &str) -> Result<(), ManagerError> {
    ctx.runner
        .run(&WineCommand::new("winetricks").arg("-q").arg(verb), Some(prefix))?;
    Ok(())
}

pub(super) fn update(
    ctx: &JobContext,
    current: BottleRecord,
    request: UpdateBottleRequest,
) -> Result<String, ManagerError> {
    let prefix = current.prefix.clone();
    let renamed = request.name != current.name;
    let target = ctx.scanner.prefix_for(&request.name);
    if renamed {
        ensure_free(&target, &request.name)?;
    }

    if request.windows != current.windows {
        winetricks(ctx, &prefix, request.windows.winetricks_verb())?;
    }
    if request.virtual_desktop != current.virtual_desktop {
        let verb = match &request.virtual_desktop {
            Some(resolution) => format!("vd={}", resolution),
            None => "vd=off".to_string(),
        };
        winetricks(ctx, &prefix, &verb)?;
    }
    if request.audio != current.audio {
        winetricks(ctx, &prefix, &format!("sound={}", request.audio.winetricks_value()))?;
    }

    // Settings are written last so a failed rename leaves them untouched
    let new_prefix = if renamed {
        // Something may have claimed the name while winetricks ran
        ensure_free(&target, &request.name)?;
        fs::rename(&prefix, &target).map_err(|e| ManagerError::io(&prefix, e))?;
        tracing::info!("Renamed {} to {}", prefix, target);
        target
    } else {
        prefix.clone()
    };

    let settings = BottleConfig {
        description: request.description.clone(),
        debug_log_level: request.debug_log_level,
        logging_enabled: request.logging_enabled,
        apps: current.apps.clone(),
    };
    if let Err(e) = ConfigManager::save_bottle_config(&new_prefix, &settings) {
        if new_prefix != prefix {
            if let Err(undo) = fs::rename(&new_prefix, &prefix) {
                tracing::warn!("Could not move {} back to {}: {}", new_prefix, prefix, undo);
            }
        }
        return Err(ManagerError::Config(e));
    }

    let record = ctx.scanner.probe(&new_prefix, &ctx.wine_version())?;
    ctx.state.update(|state| {
        let was_active = state.active.as_deref() == Some(prefix.as_path());
        if new_prefix != prefix {
            state.remove_bottle(&prefix);
        }
        state.upsert_bottle(record);
        if was_active {
            state.active = Some(new_prefix.clone());
        }
    });

    Ok(format!("Bottle '{}' updated", request.name))
}

pub(super) fn clone(
    ctx: &JobContext,
    source: BottleRecord,
    request: CloneBottleRequest,
) -> Result<String, ManagerError> {
    let target = ctx.scanner.prefix_for(&request.name);
    ensure_free(&target, &request.name)?;

    tracing::info!("Copying {} to {}", source.prefix, target);
    if let Err(e) = copy_prefix(&source.prefix, &target) {
        if let Err(cleanup) = fs::remove_dir_all(&target) {
            tracing::warn!("Failed to clean up partial copy {}: {}", target, cleanup);
        }
        return Err(ManagerError::io(&source.prefix, e));
    }

    let mut settings = bottle_config_of(&source);
    settings.description = request.description;
    ConfigManager::save_bottle_config(&target, &settings).map_err(ManagerError::Config)?;

    let record = ctx.scanner.probe(&target, &ctx.wine_version())?;
    ctx.state.upsert_bottle(record);

    Ok(format!("Bottle '{}' cloned to '{}'", source.name, request.name))
}

fn ensure_free(target: &Utf8Path, name: &str) -> Result<(), ManagerError> {
    if target.exists() {
        return Err(ManagerError::PrefixDirExists(name.to_string()));
    }
    Ok(())
}

/// Recursive copy that recreates symlinks instead of following them.
///
/// Prefixes link `dosdevices/c:` to `../drive_c` and `z:` to `/`, so
/// following links would copy the host filesystem.
pub(super) fn copy_prefix(source: &Utf8Path, target: &Utf8Path) -> io::Result<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source.as_std_path())
            .map_err(io::Error::other)?;
        let destination = target.as_std_path().join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&destination)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            #[cfg(unix)]
            std::os::unix::fs::symlink(&link, &destination)?;
            #[cfg(not(unix))]
            {
                tracing::debug!(
                    "Skipping symlink {} -> {}",
                    destination.display(),
                    link.display()
                );
            }
        } else {
            fs::copy(entry.path(), &destination)?;
        }
    }
    Ok(())
}

pub(super) fn delete(ctx: &JobContext, target: BottleRecord) -> Result<String, ManagerError> {
    let kill = WineCommand::new("wineserver").arg("-k");
    if let Err(e) = ctx.runner.run(&kill, Some(&target.prefix)) {
        tracing::warn!("Could not stop wineserver of {}: {}", target.name, e);
    }

    fs::remove_dir_all(&target.prefix).map_err(|e| ManagerError::io(&target.prefix, e))?;
    ctx.state.remove_bottle(&target.prefix);

    Ok(format!("Bottle '{}' deleted", target.name))
}
