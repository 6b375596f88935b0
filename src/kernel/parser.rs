//! Parsers for pacman and AUR helper output about kernel packages.
//!
//! All parsers are total: unexpected lines are skipped, never rejected.

use crate::models::{KernelPackage, KernelSource};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static OFFICIAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(core|extra|community)/([a-zA-Z0-9._-]+(?:-lts|-zen|-hardened|-[a-zA-Z0-9]+)*) +([0-9][^\s]+)(?:\s+\(([^)]+)\))?",
    )
    .expect("static official kernel regex")
});

static AUR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^aur/([a-zA-Z0-9._-]+) +([0-9][^\s]+)").expect("static aur kernel regex"));

static FALLBACK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(core|extra|community)/([a-zA-Z0-9._-]+) +([0-9][^\s]+)").expect("static fallback kernel regex")
});

const OFFICIAL_EXCLUDED: &[&str] = &["firmware", "headers", "api", "tools", "docs"];

const AUR_EXCLUDED: &[&str] = &[
    "-firmware",
    "-api-headers",
    "/firmware",
    "-docs",
    "-manual",
    "-source",
    "-headers-",
];

const AUR_KERNEL_SUFFIXES: &[&str] = &[
    "-lts", "-zen", "-hardened", "-rt", "-xanmod", "-cachyos", "-git", "-custom", "-ck", "-rc", "-clear", "-bore",
    "-amd", "-intel", "-bfq",
];

const AUR_NON_KERNEL: &[&str] = &["-dkms", "-driver", "-module", "-utils", "-tools", "-config", "-header"];

/// Flavour markers that distinguish `linux` from its variants in `uname -r`.
const FLAVOURS: &[&str] = &["lts", "zen", "hardened"];

fn is_indented(line: &str) -> bool {
    line.starts_with("    ") || line.starts_with('\t')
}

fn kernel_package(name: &str, version: &str, source: KernelSource, repository: Option<&str>) -> KernelPackage {
    KernelPackage {
        name: name.to_string(),
        version: version.to_string(),
        description: String::new(),
        source,
        repository: repository.map(str::to_string),
        is_installed: false,
        is_running: false,
    }
}

fn describes_kernel(description: &str) -> bool {
    let lower = description.to_lowercase();
    lower.contains("linux kernel") || lower.contains("kernel and modules")
}

/// Kernels from `pacman -Ss ^linux`.
///
/// An entry whose description line does not describe a kernel is dropped.
pub fn parse_official_search(text: &str) -> Vec<KernelPackage> {
    let mut kernels: Vec<KernelPackage> = Vec::new();
    // Index of the entry still waiting for its description line
    let mut pending: Option<usize> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(caps) = OFFICIAL_RE.captures(line.trim_end()) {
            pending = None;
            let repo = &caps[1];
            let name = &caps[2];
            if OFFICIAL_EXCLUDED.iter().any(|x| name.contains(x)) {
                continue;
            }
            kernels.push(kernel_package(name, &caps[3], KernelSource::Official, Some(repo)));
            pending = Some(kernels.len() - 1);
        } else if is_indented(line) {
            if let Some(idx) = pending.take() {
                let description = line.trim();
                if describes_kernel(description) {
                    kernels[idx].description = description.to_string();
                } else {
                    log::debug!(
                        "[Kernel] Dropping {} with non-kernel description: {}",
                        kernels[idx].name,
                        description
                    );
                    kernels.remove(idx);
                }
            }
        } else {
            pending = None;
        }
    }
    kernels
}

fn is_aur_kernel(k: &KernelPackage) -> bool {
    k.name == "linux"
        || AUR_KERNEL_SUFFIXES.iter().any(|s| k.name.ends_with(s))
        || k.description.to_lowercase().contains("kernel")
        || !AUR_NON_KERNEL.iter().any(|x| k.name.contains(x))
}

/// Kernels from `<helper> -Ss linux`, deduplicated by name.
pub fn parse_aur_search(text: &str) -> Vec<KernelPackage> {
    let mut kernels: Vec<KernelPackage> = Vec::new();
    let mut pending: Option<usize> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(caps) = AUR_RE.captures(line.trim_end()) {
            pending = None;
            let name = &caps[1];
            if !name.starts_with("linux") || AUR_EXCLUDED.iter().any(|x| name.contains(x)) {
                continue;
            }
            // Headers only make sense next to a kernel already listed
            if name.contains("-headers") {
                let base = name.replace("-headers", "");
                if !kernels.iter().any(|k| k.name == base) {
                    continue;
                }
            }
            if kernels.iter().any(|k| k.name == name) {
                continue;
            }
            kernels.push(kernel_package(name, &caps[2], KernelSource::Aur, Some("aur")));
            pending = Some(kernels.len() - 1);
        } else if is_indented(line) {
            if let Some(idx) = pending.take() {
                kernels[idx].description = line.trim().to_string();
            }
        } else {
            pending = None;
        }
    }

    kernels.into_iter().filter(is_aur_kernel).collect()
}

/// Broader `pacman -Ss linux` pass used when nothing else was found.
pub fn parse_fallback_search(text: &str) -> Vec<KernelPackage> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.contains("linux"))
        .filter_map(|line| FALLBACK_RE.captures(line))
        .filter(|caps| {
            let name = &caps[2];
            name.starts_with("linux") && !name.contains("headers") && !name.contains("firmware")
        })
        .map(|caps| {
            let mut k = kernel_package(&caps[2], &caps[3], KernelSource::Official, Some(&caps[1]));
            k.description = "Linux kernel package".to_string();
            k
        })
        .collect()
}

/// Whether a `pacman -Q` package name is a kernel image.
pub fn is_installed_kernel_name(name: &str) -> bool {
    name == "linux"
        || (name.starts_with("linux-")
            && !name.starts_with("linux-firmware")
            && !name.starts_with("linux-api-headers")
            && !name.starts_with("linux-headers")
            && !name.ends_with("-docs")
            && !name.ends_with("-tools"))
}

/// Installed kernels from `pacman -Q`, with `is_running` computed against
/// `uname`.
pub fn parse_installed(text: &str, uname: &str) -> Vec<KernelPackage> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            Some((parts.next()?, parts.next()?))
        })
        .filter(|(name, _)| is_installed_kernel_name(name))
        .map(|(name, version)| {
            let mut k = kernel_package(name, version, KernelSource::Official, None);
            k.is_installed = true;
            k.is_running = is_running_kernel(name, version, uname);
            k
        })
        .collect()
}

/// Heuristic match of a package against `uname -r`.
///
/// Base versions (before the first `-`) must agree. Then plain `linux` wins
/// when uname carries no flavour marker, and `linux-X` wins when `X` is part
/// of uname. This can misfire when two flavours share a base version.
pub fn is_running_kernel(name: &str, version: &str, uname: &str) -> bool {
    if uname.is_empty() || uname == "Unknown" || uname == "Error" {
        return false;
    }
    let version_base = version.split('-').next().unwrap_or(version);
    let uname_base = uname.split('-').next().unwrap_or(uname);
    if version_base != uname_base {
        return false;
    }
    if name == "linux" {
        return !FLAVOURS.iter().any(|f| uname.contains(f));
    }
    match name.strip_prefix("linux-") {
        Some(suffix) => uname.contains(suffix),
        None => false,
    }
}

/// `Key : value` pairs from `pacman -Qi` / `-Si`. Continuation lines are
/// appended to the previous value.
pub fn parse_pacman_info(text: &str) -> HashMap<String, String> {
    let mut info: HashMap<String, String> = HashMap::new();
    let mut last_key: Option<String> = None;
    for line in text.lines() {
        if line.trim().is_empty() {
            last_key = None;
            continue;
        }
        match line.split_once(" : ") {
            Some((key, value)) if !line.starts_with(' ') => {
                let key = key.trim().to_string();
                info.insert(key.clone(), value.trim().to_string());
                last_key = Some(key);
            }
            _ => {
                if let Some(key) = &last_key {
                    if let Some(value) = info.get_mut(key) {
                        value.push(' ');
                        value.push_str(line.trim());
                    }
                }
            }
        }
    }
    info
}
