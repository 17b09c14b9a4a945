// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Per-key value checks for the configuration profiles.
//!
//! Most configuration values end up inside batch command lines, so every key
//! has a closed-form shape and anything outside it is rejected before use.

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

fn is_segment_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || ch == '.'
}

/// Single word: `[A-Za-z0-9_]+`.
pub fn is_word(value: &str) -> bool {
    !value.is_empty() && value.chars().all(is_word_char)
}

/// Bucket names additionally allow `-`.
pub fn is_bucket_word(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|ch| is_word_char(ch) || ch == '-')
}

pub fn is_number(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|ch| ch.is_ascii_digit())
}

/// Node counts: digits with an optional `k`/`m` suffix.
pub fn is_node_count(value: &str) -> bool {
    let digits = value
        .strip_suffix(['k', 'm'])
        .unwrap_or(value);
    is_number(digits)
}

/// Dot-separated word sequence (hostname or IP), not ending in a dot.
pub fn is_dotted_host(value: &str) -> bool {
    if value.is_empty() || value.ends_with('.') {
        return false;
    }
    value.split('.').all(|part| {
        !part.is_empty() && part.chars().all(|ch| is_word_char(ch) || ch == '-')
    })
}

/// Endpoint URL: `(http(s)://)? host (:port)? (/)?`.
pub fn is_endpoint_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .unwrap_or(value);
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    let (host, port) = match rest.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (rest, None),
    };
    if !is_dotted_host(host) {
        return false;
    }
    match port {
        Some(port) => is_number(port),
        None => true,
    }
}

/// Absolute POSIX path: `/seg(/seg)*` where segments are word characters
/// plus `-` and `.`.
pub fn is_abs_path(value: &str) -> bool {
    let Some(rest) = value.strip_prefix('/') else {
        return false;
    };
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    if rest.is_empty() {
        // bare "/" is not a usable prefix
        return false;
    }
    rest.split('/').all(|seg| {
        !seg.is_empty()
            && seg != "."
            && seg != ".."
            && seg.chars().all(is_segment_char)
    })
}

/// Absolute path, optionally written relative to the home directory (`~/...`).
pub fn is_home_path(value: &str) -> bool {
    match value.strip_prefix("~/") {
        Some(rest) => is_abs_path(&format!("/{rest}")),
        None => is_abs_path(value),
    }
}

/// Simple `local@host` mail address form.
pub fn is_email(value: &str) -> bool {
    let Some((local, host)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty()
        || !local
            .chars()
            .all(|ch| is_word_char(ch) || matches!(ch, '.' | '-' | '+'))
    {
        return false;
    }
    is_dotted_host(host) && host.contains('.')
}

/// Slurm walltime: `[DD-][HH:][MM:]SS`, every component numeric.
pub fn is_walltime(value: &str) -> bool {
    let (days, clock) = match value.split_once('-') {
        Some((days, clock)) => (Some(days), clock),
        None => (None, value),
    };
    if let Some(days) = days {
        if !is_number(days) {
            return false;
        }
    }
    let parts: Vec<&str> = clock.split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return false;
    }
    parts.iter().all(|part| is_number(part))
}

/// Module list in bracketed form: `[gcc/11.2, openmpi]`. Returns the parsed
/// module names, or `None` when the value is malformed.
pub fn parse_module_list(value: &str) -> Option<Vec<String>> {
    let inner = value.trim().strip_prefix('[')?.strip_suffix(']')?;
    let inner = inner.trim();
    if inner.is_empty() {
        return Some(Vec::new());
    }
    let mut modules = Vec::new();
    for item in inner.split(',') {
        let name = item.trim();
        if name.is_empty()
            || !name.chars().all(|ch| is_segment_char(ch) || ch == '/')
        {
            return None;
        }
        modules.push(name.to_string());
    }
    Some(modules)
}

/// Request identifiers name directories, archives and object keys.
pub fn is_request_id(value: &str) -> bool {
    is_bucket_word(value)
}

/// Remote container reference: a known scheme and a registry path made of
/// path/tag characters. The reference is handed to the image build job, so
/// it gets the same closed-form treatment as configuration values.
pub fn is_container_url(value: &str) -> bool {
    let Some((scheme, rest)) = value.split_once("://") else {
        return false;
    };
    if !matches!(scheme, "docker" | "oras" | "library" | "shub" | "http" | "https") {
        return false;
    }
    !rest.is_empty()
        && rest
            .chars()
            .all(|ch| is_segment_char(ch) || matches!(ch, '/' | ':' | '@'))
}
