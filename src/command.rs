//! Command resolution and file handling for the command line tool.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::codegen::{self, GenerateOptions};
use crate::dsl;
use crate::error::{GeneratorError, Result};
use crate::extract;

/// Extension of driver definition files.
pub const DEFINITION_EXTENSION: &str = "driver";

/// What one invocation does.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Compile a definition into the driver's C files, written next to it
    Generate { definition: PathBuf },
    /// Rebuild a definition from a generated implementation file
    Extract { source: PathBuf, definition: PathBuf },
}

impl Command {
    /// Decide the mode for `file`.
    ///
    /// `create` always extracts into `<file>.driver`. A file that is not a
    /// definition but has a sibling definition is extracted back into that
    /// definition. Everything else is generated.
    pub fn resolve(file: &Path, create: bool) -> Result<Self> {
        let is_definition = file
            .extension()
            .map_or(false, |extension| extension == DEFINITION_EXTENSION);
        if create {
            if is_definition {
                return Err(GeneratorError::usage(format!(
                    "--create expects a generated source file, not {}",
                    file.display()
                )));
            }
            return Ok(Command::Extract {
                source: file.to_path_buf(),
                definition: file.with_extension(DEFINITION_EXTENSION),
            });
        }
        if !is_definition {
            let definition = file.with_extension(DEFINITION_EXTENSION);
            if definition.is_file() {
                return Ok(Command::Extract {
                    source: file.to_path_buf(),
                    definition,
                });
            }
        }
        Ok(Command::Generate {
            definition: file.to_path_buf(),
        })
    }

    /// Run the command and return the paths written.
    pub fn run(&self) -> Result<Vec<PathBuf>> {
        match self {
            Command::Generate { definition } => generate_files(definition),
            Command::Extract { source, definition } => {
                extract_definition(source, definition).map(|path| vec![path])
            }
        }
    }
}

fn generate_files(definition: &Path) -> Result<Vec<PathBuf>> {
    let driver = dsl::parse_file(definition)?;
    let options = match definition.file_name() {
        Some(name) => GenerateOptions {
            source_name: name.to_string_lossy().into_owned(),
        },
        None => GenerateOptions::for_driver(&driver),
    };
    let generated = codegen::generate(&driver, &options);

    let directory = definition.parent().unwrap_or_else(|| Path::new(""));
    let mut written = Vec::new();
    for (name, content) in generated.files() {
        let path = directory.join(name);
        fs::write(&path, content).map_err(|e| GeneratorError::write(&path, e))?;
        info!("wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

fn extract_definition(source: &Path, definition: &Path) -> Result<PathBuf> {
    let content = fs::read_to_string(source).map_err(|e| GeneratorError::read(source, e))?;
    if !extract::is_generated(&content) {
        warn!(
            "{} does not look like a generated driver, extraction may be incomplete",
            source.display()
        );
    }
    let driver = extract::extract(&content);
    let text = dsl::print(&driver);
    fs::write(definition, text).map_err(|e| GeneratorError::write(definition, e))?;
    info!("wrote {}", definition.display());
    Ok(definition.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "indigo_generator_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    const DEFINITION: &str = r#"driver upb {
    label = "Powerbox";
    serial { }
    code {
        static bool upb_open(indigo_device *device) { return true; }
        static void upb_close(indigo_device *device) { }
    }
    aux {
        switch power { persistent = true; item on; item off; }
    }
}
"#;

    #[test]
    fn test_resolve_modes() {
        let dir = scratch("resolve");
        let source = dir.join("indigo_aux_upb.c");
        assert_eq!(
            Command::resolve(&source, true).unwrap(),
            Command::Extract {
                source: source.clone(),
                definition: dir.join("indigo_aux_upb.driver"),
            }
        );
        assert_eq!(
            Command::resolve(&source, false).unwrap(),
            Command::Generate {
                definition: source.clone()
            }
        );

        fs::write(dir.join("indigo_aux_upb.driver"), DEFINITION).unwrap();
        assert_eq!(
            Command::resolve(&source, false).unwrap(),
            Command::Extract {
                source: source.clone(),
                definition: dir.join("indigo_aux_upb.driver"),
            }
        );
        let definition = dir.join("indigo_aux_upb.driver");
        assert_eq!(
            Command::resolve(&definition, false).unwrap(),
            Command::Generate {
                definition: definition.clone()
            }
        );
        assert!(matches!(
            Command::resolve(&definition, true),
            Err(GeneratorError::UsageError { .. })
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_generate_writes_three_files() {
        let dir = scratch("generate");
        let definition = dir.join("indigo_aux_upb.driver");
        fs::write(&definition, DEFINITION).unwrap();

        let written = Command::Generate {
            definition: definition.clone(),
        }
        .run()
        .unwrap();
        assert_eq!(
            written,
            [
                dir.join("indigo_aux_upb.h"),
                dir.join("indigo_aux_upb_main.c"),
                dir.join("indigo_aux_upb.c"),
            ]
        );
        let source = fs::read_to_string(dir.join("indigo_aux_upb.c")).unwrap();
        assert!(source.contains("// This file generated from indigo_aux_upb.driver\n"));
        assert!(source.contains("indigo_save_property(device, NULL, POWER_PROPERTY);"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_generate_error_writes_nothing() {
        let dir = scratch("error");
        let definition = dir.join("indigo_aux_bad.driver");
        fs::write(&definition, "driver bad { aux { switch x { label = \"x\" } } }").unwrap();

        let result = Command::Generate { definition }.run();
        assert!(matches!(result, Err(GeneratorError::SyntaxError { .. })));
        assert!(!dir.join("indigo_aux_bad.c").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_definition_is_read_error() {
        let dir = scratch("missing");
        let result = Command::Generate {
            definition: dir.join("nothing.driver"),
        }
        .run();
        assert!(matches!(result, Err(GeneratorError::FileReadError { .. })));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_edit_and_extract_round_trip() {
        let dir = scratch("round_trip");
        let definition = dir.join("indigo_aux_upb.driver");
        fs::write(&definition, DEFINITION).unwrap();
        Command::Generate {
            definition: definition.clone(),
        }
        .run()
        .unwrap();

        let source = dir.join("indigo_aux_upb.c");
        let edited = fs::read_to_string(&source)
            .unwrap()
            .replace("return true; }", "return upb_handshake(device); }");
        fs::write(&source, edited).unwrap();

        let command = Command::resolve(&source, false).unwrap();
        assert_eq!(command.run().unwrap(), [definition.clone()]);

        let driver = dsl::parse_file(&definition).unwrap();
        let code = driver.code(dsl::DriverRole::Code).unwrap();
        assert!(code.text.contains("return upb_handshake(device); }"));
        assert!(driver.device(dsl::DeviceKind::Aux).unwrap().property("POWER").unwrap().persistent);
        let _ = fs::remove_dir_all(&dir);
    }
}
