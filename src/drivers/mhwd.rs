//! Drivers offered by `mhwd -l`.

use super::{category_label, DriverLister};
use crate::error::AppError;
use crate::models::{DriverEntry, DriverSource};
use crate::system::command::{CommandSpec, QUERY_TIMEOUT};
use once_cell::sync::Lazy;
use regex::Regex;

static ANSI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1B\[[0-9;]*[mG]").expect("static ansi regex"));
static DRIVER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+/\w+)").expect("static mhwd driver regex"));

const FREE_HEADER: &str = "Free drivers:";
const NONFREE_HEADER: &str = "Non-free drivers:";
const MHWD_CATEGORY: &str = "Video";

pub fn strip_ansi(text: &str) -> String {
    ANSI_RE.replace_all(text, "").into_owned()
}

/// Free and non-free driver names from `mhwd -l` output.
pub fn parse_driver_sections(output: &str) -> (Vec<String>, Vec<String>) {
    let names = |section: &str| -> Vec<String> {
        DRIVER_RE
            .captures_iter(section)
            .map(|caps| caps[1].to_string())
            .collect()
    };

    let free = output
        .find(FREE_HEADER)
        .map(|start| {
            let rest = &output[start + FREE_HEADER.len()..];
            let end = rest.find(NONFREE_HEADER).unwrap_or(rest.len());
            names(&rest[..end])
        })
        .unwrap_or_default();

    let nonfree = output
        .find(NONFREE_HEADER)
        .map(|start| names(&output[start + NONFREE_HEADER.len()..]))
        .unwrap_or_default();

    (free, nonfree)
}

/// Whether `mhwd -li` lists `name` as installed.
pub fn is_installed(li_output: &str, name: &str) -> bool {
    li_output.contains(name) && li_output.contains("installed")
}

/// The line following a `>` header that mentions `name`, if any.
pub fn description_for(li_output: &str, name: &str) -> Option<String> {
    let lines: Vec<&str> = li_output.lines().collect();
    lines.iter().enumerate().find_map(|(i, line)| {
        let header = line.split_once('>')?.1;
        if !header.contains(name) {
            return None;
        }
        lines
            .get(i + 1)
            .map(|next| next.trim())
            .filter(|next| !next.is_empty())
            .map(str::to_string)
    })
}

fn entry(name: &str, li_output: &str, source: DriverSource) -> DriverEntry {
    let installed = is_installed(li_output, name);
    DriverEntry {
        name: name.to_string(),
        package: name.replace('/', "-"),
        description: description_for(li_output, name).unwrap_or_else(|| format!("MHWD driver: {}", name)),
        category: MHWD_CATEGORY.to_string(),
        category_label: category_label(MHWD_CATEGORY),
        compatible: true,
        installed,
        loaded: installed,
        source,
        firmware_files: Vec::new(),
    }
}

/// Build entries from raw `mhwd -l` and `mhwd -li` output.
pub fn entries_from_output(list_output: &str, li_output: &str) -> Vec<DriverEntry> {
    let list_output = strip_ansi(list_output);
    let li_output = strip_ansi(li_output);
    let (free, nonfree) = parse_driver_sections(&list_output);
    free.iter()
        .map(|name| entry(name, &li_output, DriverSource::MhwdFree))
        .chain(nonfree.iter().map(|name| entry(name, &li_output, DriverSource::MhwdNonfree)))
        .collect()
}

pub async fn list(lister: &DriverLister) -> Result<Vec<DriverEntry>, AppError> {
    let system = lister.system();
    if !system.command_exists("mhwd").await {
        log::debug!("[Drivers] mhwd not available, skipping");
        return Ok(Vec::new());
    }

    let runner = system.runner();
    let list = runner
        .run(CommandSpec::new("mhwd").arg("-l").timeout(QUERY_TIMEOUT).c_locale())
        .await?;
    if !list.success() {
        return Err(AppError::OsCommand {
            cmd: "mhwd -l".to_string(),
            reason: format!("exit code {}: {}", list.code(), list.stderr_tail(3)),
        });
    }

    let li_output = match runner
        .run(CommandSpec::new("mhwd").arg("-li").timeout(QUERY_TIMEOUT).c_locale())
        .await
    {
        Ok(out) => out.stdout,
        Err(e) => {
            log::warn!("[Drivers] mhwd -li failed: {}", e);
            String::new()
        }
    };

    Ok(entries_from_output(&list.stdout, &li_output))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = "\x1b[1m> 0000:01:00.0 (0300:10de:1b80) Display controller nVidia Corporation:\x1b[0m\n\
--------------------------------------------------------------------------------\n\
Free drivers:\n  video/linux\n  video/modesetting\n\
Non-free drivers:\n  video/nvidia\n";

    #[test]
    fn test_sections() {
        let (free, nonfree) = parse_driver_sections(&strip_ansi(LIST));
        assert_eq!(free, vec!["video/linux", "video/modesetting"]);
        assert_eq!(nonfree, vec!["video/nvidia"]);
    }

    #[test]
    fn test_missing_sections() {
        let (free, nonfree) = parse_driver_sections("nothing to see");
        assert!(free.is_empty());
        assert!(nonfree.is_empty());
    }

    #[test]
    fn test_entries() {
        let li = "> Installed PCI configs:\n   video/nvidia  2023.03.23  false  PCI\n\
> video/nvidia\nClosed source NVIDIA drivers\n\nstatus: installed\n";
        let entries = entries_from_output(LIST, li);
        assert_eq!(entries.len(), 3);

        let nvidia = &entries[2];
        assert_eq!(nvidia.package, "video-nvidia");
        assert_eq!(nvidia.source, DriverSource::MhwdNonfree);
        assert!(nvidia.installed);
        assert!(nvidia.loaded);
        assert_eq!(nvidia.description, "Closed source NVIDIA drivers");
        assert_eq!(nvidia.category_label, "Video Card");

        let linux = &entries[0];
        assert!(!linux.installed);
        assert_eq!(linux.description, "MHWD driver: video/linux");
        assert_eq!(linux.source, DriverSource::MhwdFree);
    }
}
