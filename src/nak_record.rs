//! Runtime (NAK) descriptor: where a shared runtime lives, the loaders it
//! provides, and the environment it contributes at layer 2.

use crate::install_record::Provenance;
use crate::types::EnvValue;
use crate::values;
use crate::warnings::{fields, Fields, Warning};
use std::collections::BTreeMap;

/// One entry binary provided by a runtime. `args_template` entries may
/// carry placeholders, expanded at composition time.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    pub exec_path: String,
    pub args_template: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NakPaths {
    pub root: String,
    pub resource_root: String,
    pub lib_dirs: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NakExecution {
    pub cwd: String,
}

#[derive(Debug, Clone, Default)]
pub struct NakRecord {
    pub source_path: String,
    pub id: String,
    pub version: String,
    pub paths: NakPaths,
    pub environment: BTreeMap<String, EnvValue>,
    pub loaders: BTreeMap<String, Loader>,
    pub execution: Option<NakExecution>,
    pub provenance: Provenance,
}

impl NakRecord {
    pub fn has_loaders(&self) -> bool {
        !self.loaders.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct NakRecordParse {
    pub ok: bool,
    pub record: NakRecord,
    pub emissions: Vec<(Warning, Fields)>,
    pub error: String,
}

impl NakRecordParse {
    fn fail(error: impl Into<String>) -> Self {
        NakRecordParse {
            error: error.into(),
            ..Default::default()
        }
    }
}

fn parse_loader(section: &serde_json::Value, name: &str) -> Result<Loader, String> {
    let exec_path = match values::get_path(section, "exec_path") {
        Some(path) if !path.trim().is_empty() => path,
        Some(_) => return Err(format!("loaders.{}.exec_path empty", name)),
        None => return Err(format!("loaders.{}.exec_path missing", name)),
    };
    Ok(Loader {
        exec_path,
        args_template: values::get_string_array(section, "args_template"),
    })
}

/// Parse a runtime descriptor (JSON or nested-table form). `nak.id`,
/// `nak.version`, and `paths.root` are required; `paths.resource_root`
/// defaults to the root. A `loaders` map and a singular `loader` block
/// (auto-named `default`) are both accepted; if both appear, `loaders`
/// wins with a warning.
pub fn parse_nak_record(content: &str, source_path: &str) -> NakRecordParse {
    let root = match values::parse_document(content) {
        Ok(root) => root,
        Err(error) => return NakRecordParse::fail(error),
    };

    let mut out = NakRecordParse::default();
    out.record.source_path = source_path.to_string();

    match values::get_object(&root, "nak") {
        Some(nak) => {
            match values::get_string(nak, "id") {
                Some(id) if !id.trim().is_empty() => out.record.id = id,
                Some(_) => return NakRecordParse::fail("nak.id empty"),
                None => return NakRecordParse::fail("nak.id missing"),
            }
            match values::get_string(nak, "version") {
                Some(version) if !version.trim().is_empty() => out.record.version = version,
                Some(_) => return NakRecordParse::fail("nak.version empty"),
                None => return NakRecordParse::fail("nak.version missing"),
            }
        }
        None => return NakRecordParse::fail("nak section missing"),
    }

    match values::get_object(&root, "paths") {
        Some(paths) => {
            match values::get_path(paths, "root") {
                Some(nak_root) if !nak_root.trim().is_empty() => {
                    out.record.paths.root = nak_root;
                }
                Some(_) => return NakRecordParse::fail("paths.root empty"),
                None => return NakRecordParse::fail("paths.root missing"),
            }
            out.record.paths.resource_root = values::get_path(paths, "resource_root")
                .unwrap_or_else(|| out.record.paths.root.clone());
            out.record.paths.lib_dirs = values::get_path_array(paths, "lib_dirs");
        }
        None => return NakRecordParse::fail("paths section missing"),
    }

    out.record.environment = values::get_env_map(&root, "environment");

    let loaders_table = values::get_object(&root, "loaders");
    let singular = values::get_object(&root, "loader");
    if let Some(table) = loaders_table {
        if singular.is_some() {
            out.emissions.push((
                Warning::InvalidConfiguration,
                fields(&[("reason", "duplicate_loader_block"), ("source_path", source_path)]),
            ));
        }
        if let Some(map) = table.as_object() {
            for (name, loader_json) in map {
                if !loader_json.is_object() {
                    continue;
                }
                match parse_loader(loader_json, name) {
                    Ok(loader) => {
                        out.record.loaders.insert(name.clone(), loader);
                    }
                    Err(error) => return NakRecordParse::fail(error),
                }
            }
        }
    } else if let Some(loader_json) = singular {
        match parse_loader(loader_json, "default") {
            Ok(loader) => {
                out.record.loaders.insert("default".to_string(), loader);
            }
            Err(error) => return NakRecordParse::fail(error),
        }
    }

    if let Some(execution) = values::get_object(&root, "execution") {
        out.record.execution = Some(NakExecution {
            cwd: values::get_string(execution, "cwd").unwrap_or_default(),
        });
    }

    if let Some(provenance) = values::get_object(&root, "provenance") {
        out.record.provenance.package_hash =
            values::get_string(provenance, "package_hash").unwrap_or_default();
        out.record.provenance.installed_at =
            values::get_string(provenance, "installed_at").unwrap_or_default();
        out.record.provenance.installed_by =
            values::get_string(provenance, "installed_by").unwrap_or_default();
        out.record.provenance.source =
            values::get_string(provenance, "source").unwrap_or_default();
    }

    out.ok = true;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EnvOp;

    const LUA: &str = r#"{
  "nak": {"id": "lua", "version": "5.4.6"},
  "paths": {
    "root": "/nah/naks/lua/5.4.6",
    "lib_dirs": ["/nah/naks/lua/5.4.6/lib"]
  },
  "environment": {
    "LUA_PATH": {"op": "prepend", "value": "{NAH_NAK_ROOT}/share/?.lua", "separator": ";"}
  },
  "loaders": {
    "default": {
      "exec_path": "/nah/naks/lua/5.4.6/bin/lua",
      "args_template": ["{NAH_APP_ENTRY}"]
    }
  },
  "execution": {"cwd": "work"}
}"#;

    #[test]
    fn test_full_record() {
        let parse = parse_nak_record(LUA, "lua@5.4.6.json");
        assert!(parse.ok, "{}", parse.error);
        let r = &parse.record;
        assert_eq!(r.id, "lua");
        assert_eq!(r.version, "5.4.6");
        assert_eq!(r.paths.resource_root, "/nah/naks/lua/5.4.6");
        assert_eq!(r.paths.lib_dirs, ["/nah/naks/lua/5.4.6/lib"]);
        assert_eq!(r.environment["LUA_PATH"].op, EnvOp::Prepend);
        assert_eq!(r.loaders["default"].args_template, ["{NAH_APP_ENTRY}"]);
        assert_eq!(r.execution.as_ref().unwrap().cwd, "work");
    }

    #[test]
    fn test_resource_root_defaults_to_root() {
        let content = r#"{
  "nak": {"id": "lua", "version": "5.4.6"},
  "paths": {"root": "/nah/naks/lua/5.4.6"}
}"#;
        let parse = parse_nak_record(content, "r");
        assert_eq!(parse.record.paths.resource_root, "/nah/naks/lua/5.4.6");
    }

    #[test]
    fn test_singular_loader_becomes_default() {
        let content = r#"{
  "nak": {"id": "node", "version": "20.0.0"},
  "paths": {"root": "/nah/naks/node/20.0.0"},
  "loader": {"exec_path": "/nah/naks/node/20.0.0/bin/node"}
}"#;
        let parse = parse_nak_record(content, "r");
        assert!(parse.ok);
        assert!(parse.record.loaders.contains_key("default"));
    }

    #[test]
    fn test_both_loader_forms_prefers_map_with_warning() {
        let content = r#"{
  "nak": {"id": "node", "version": "20.0.0"},
  "paths": {"root": "/naks/node"},
  "loaders": {"repl": {"exec_path": "/naks/node/bin/node"}},
  "loader": {"exec_path": "/naks/node/bin/other"}
}"#;
        let parse = parse_nak_record(content, "r");
        assert!(parse.ok);
        assert_eq!(parse.record.loaders.len(), 1);
        assert!(parse.record.loaders.contains_key("repl"));
        assert_eq!(parse.emissions[0].0, Warning::InvalidConfiguration);
    }

    #[test]
    fn test_loader_without_exec_path_fails() {
        let content = r#"{
  "nak": {"id": "node", "version": "20.0.0"},
  "paths": {"root": "/naks/node"},
  "loaders": {"repl": {"args_template": ["x"]}}
}"#;
        let parse = parse_nak_record(content, "r");
        assert!(!parse.ok);
        assert!(parse.error.contains("exec_path"));
    }

    #[test]
    fn test_missing_required_fields() {
        assert!(!parse_nak_record("{}", "r").ok);
        assert!(!parse_nak_record(r#"{"nak": {"id": "lua"}}"#, "r").ok);
        assert!(
            !parse_nak_record(r#"{"nak": {"id": "lua", "version": "5.4.6"}}"#, "r").ok
        );
    }

    #[test]
    fn test_toml_form_accepted() {
        let content = r#"
[nak]
id = "lua"
version = "5.4.6"

[paths]
root = "/nah/naks/lua/5.4.6"
"#;
        let parse = parse_nak_record(content, "lua.toml");
        assert!(parse.ok, "{}", parse.error);
        assert_eq!(parse.record.id, "lua");
    }
}
