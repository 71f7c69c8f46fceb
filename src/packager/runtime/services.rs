//! Service module discovery and static-link wrapper generation.
//!
//! A services directory contributes one service per top-level `.ts`/`.tsx`
//! file (named by its stem) and one per subdirectory containing `index.ts`
//! (named by the directory). Discovery is sorted so wrapper generation and
//! therefore compiled output is deterministic.

use std::path::{Path, PathBuf};

/// One discovered service module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Service {
    /// Logical name the runtime exposes the module under.
    pub name: String,
    /// Absolute path to the module entry file.
    pub entry: PathBuf,
}

/// Global the generated wrappers publish compiled services on; the host and
/// worker bootstraps read it instead of loading sources from disk.
pub const COMPILED_SERVICES_GLOBAL: &str = "__KEEL_COMPILED_SERVICES__";

fn is_module_source(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("ts") | Some("tsx")
    )
}

/// Discovers service modules in a directory. An absent directory yields no
/// services; it is never an error.
pub fn discover_services(dir: &Path) -> Vec<Service> {
    let Ok(read) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut entries: Vec<PathBuf> = read.filter_map(|e| e.ok().map(|e| e.path())).collect();
    entries.sort();

    let mut services = Vec::new();
    for entry in entries {
        if entry.is_file() && is_module_source(&entry) {
            if let Some(stem) = entry.file_stem().and_then(|s| s.to_str()) {
                services.push(Service {
                    name: stem.to_string(),
                    entry,
                });
            }
        } else if entry.is_dir() {
            let index = entry.join("index.ts");
            if index.exists() {
                if let Some(name) = entry.file_name().and_then(|n| n.to_str()) {
                    services.push(Service {
                        name: name.to_string(),
                        entry: index,
                    });
                }
            }
        }
    }
    services
}

/// Generates the transient host entry module: static imports for every
/// service, the name-to-module map on the compiled-services global, then the
/// host bootstrap.
pub fn host_wrapper_source(services: &[Service], host_module: &Path) -> String {
    let mut lines = Vec::new();
    for (i, service) in services.iter().enumerate() {
        lines.push(format!(
            "import * as _svc{i} from \"{}\";",
            service.entry.display()
        ));
    }
    lines.push(format!(
        "(globalThis as any).{COMPILED_SERVICES_GLOBAL} = {{"
    ));
    for (i, service) in services.iter().enumerate() {
        lines.push(format!("  \"{}\": _svc{i},", service.name));
    }
    lines.push("};".to_string());
    lines.push(format!("await import(\"{}\");", host_module.display()));
    lines.join("\n")
}

/// Generates the transient worker entry module. Services are nested per
/// worker name so one worker host executable can serve every declared worker.
pub fn worker_wrapper_source(
    workers_services: &[(String, Vec<Service>)],
    worker_host_module: &Path,
) -> String {
    let mut lines = Vec::new();
    for (worker, services) in workers_services {
        for (i, service) in services.iter().enumerate() {
            lines.push(format!(
                "import * as _w_{worker}_{i} from \"{}\";",
                service.entry.display()
            ));
        }
    }

    lines.push(format!(
        "(globalThis as any).{COMPILED_SERVICES_GLOBAL} = {{"
    ));
    for (worker, services) in workers_services {
        lines.push(format!("  \"{worker}\": {{"));
        for (i, service) in services.iter().enumerate() {
            lines.push(format!("    \"{}\": _w_{worker}_{i},", service.name));
        }
        lines.push("  },".to_string());
    }
    lines.push("};".to_string());
    lines.push(format!("await import(\"{}\");", worker_host_module.display()));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_follows_file_and_index_conventions() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("files.ts"), "").expect("write");
        std::fs::write(dir.path().join("panel.tsx"), "").expect("write");
        std::fs::write(dir.path().join("notes.md"), "").expect("write");
        std::fs::create_dir_all(dir.path().join("search")).expect("mkdir");
        std::fs::write(dir.path().join("search/index.ts"), "").expect("write");
        std::fs::create_dir_all(dir.path().join("no-index")).expect("mkdir");

        let services = discover_services(dir.path());
        let names: Vec<&str> = services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["files", "panel", "search"]);
        assert!(services[2].entry.ends_with("search/index.ts"));
    }

    #[test]
    fn missing_directory_yields_no_services() {
        assert!(discover_services(Path::new("/nonexistent/services")).is_empty());
    }

    #[test]
    fn host_wrapper_publishes_services_then_boots_host() {
        let services = vec![
            Service {
                name: "files".to_string(),
                entry: PathBuf::from("/app/runtime/services/files.ts"),
            },
            Service {
                name: "search".to_string(),
                entry: PathBuf::from("/app/runtime/services/search/index.ts"),
            },
        ];
        let source = host_wrapper_source(&services, Path::new("/engine/runtime/host.ts"));

        assert!(source.contains("import * as _svc0 from \"/app/runtime/services/files.ts\";"));
        assert!(source.contains("\"search\": _svc1,"));
        assert!(source.contains(COMPILED_SERVICES_GLOBAL));
        assert!(source.ends_with("await import(\"/engine/runtime/host.ts\");"));
    }

    #[test]
    fn worker_wrapper_nests_services_per_worker() {
        let workers = vec![
            (
                "indexer".to_string(),
                vec![Service {
                    name: "crawl".to_string(),
                    entry: PathBuf::from("/app/runtime/indexer-services/crawl.ts"),
                }],
            ),
            (
                "sync".to_string(),
                vec![Service {
                    name: "push".to_string(),
                    entry: PathBuf::from("/app/runtime/sync-services/push.ts"),
                }],
            ),
        ];
        let source = worker_wrapper_source(&workers, Path::new("/engine/runtime/worker-host.ts"));

        assert!(source.contains("import * as _w_indexer_0"));
        assert!(source.contains("  \"indexer\": {"));
        assert!(source.contains("    \"crawl\": _w_indexer_0,"));
        assert!(source.contains("    \"push\": _w_sync_0,"));
        assert!(source.ends_with("await import(\"/engine/runtime/worker-host.ts\");"));
    }
}
