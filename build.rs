use std::collections::HashMap;
use std::env;
use std::fmt::Write;
use std::fs;
use std::path::PathBuf;

static CONFIGS: &[(&str, usize)] = &[
    ("IFACE_MAX_COUNT", 4),
    ("IFACE_MAX_NAME_LEN", 15),
    ("IFACE_MAX_IPV6_ADDR_COUNT", 4),
    ("IFACE_MAX_IPV6_MADDR_COUNT", 8),
    ("IFACE_MAX_IPV6_PREFIX_COUNT", 2),
    ("IFACE_MAX_IPV6_CONFIG_COUNT", 4),
    ("IFACE_MAX_IPV4_ADDR_COUNT", 2),
    ("IFACE_MAX_IPV4_MADDR_COUNT", 4),
    ("IFACE_MAX_IPV4_CONFIG_COUNT", 4),
    ("IFACE_MAX_MCAST_SOURCE_COUNT", 4),
    ("IFACE_MAX_ROUTER_COUNT", 4),
    ("IFACE_MAX_MONITOR_COUNT", 4),
    ("IFACE_MAX_EVENT_COUNT", 32),
];

struct Config {
    name: String,
    value: usize,
}

fn main() {
    // Defaults, overridable through `SMOLNETIF_<NAME>` environment variables.
    let mut configs = HashMap::new();
    for (name, default) in CONFIGS {
        configs.insert(
            *name,
            Config {
                name: name.to_string(),
                value: *default,
            },
        );
    }

    let prefix = "SMOLNETIF_";
    for (var, value) in env::vars() {
        if let Some(name) = var.strip_prefix(prefix) {
            let Some(cfg) = configs.get_mut(name) else {
                panic!("Unknown config {var}");
            };
            cfg.value = value
                .parse()
                .unwrap_or_else(|_| panic!("{var} must be a non-negative integer, got {value:?}"));
        }
    }

    // Rerun if any of the variables change.
    for name in configs.keys() {
        println!("cargo:rerun-if-env-changed={prefix}{name}");
    }

    let mut names: Vec<_> = configs.values().collect();
    names.sort_by(|a, b| a.name.cmp(&b.name));

    let mut data = String::new();
    for cfg in names {
        let _ = writeln!(data, "pub const {}: usize = {};", cfg.name, cfg.value);
    }

    let out_dir = PathBuf::from(env::var_os("OUT_DIR").unwrap());
    let out_file = out_dir.join("config.rs").to_string_lossy().to_string();
    fs::write(out_file, data).unwrap();
}
