//! Scripted end-to-end tests of the engine's public operations, in the
//! teacher's `storage::bitcask` goldenscript style: one test function per
//! `.gs` file under `tests/testscripts/`, each a sequence of commands and
//! their expected output.

use std::error::Error as StdError;
use std::result::Result as StdResult;

use caskdb::{Engine, Options};
use test_each_file::test_each_path;

test_each_path! { in "tests/testscripts" as scripts => run_script }

fn run_script(path: &std::path::Path) {
    goldenscript::run(&mut Runner::new(), path).expect("goldenscript failed")
}

/// Drives an [`Engine`] from goldenscript commands.
struct Runner {
    tempdir: tempfile::TempDir,
    engine: Engine,
}

impl Runner {
    fn new() -> Self {
        let tempdir = tempfile::TempDir::with_prefix("caskdb").expect("tempdir failed");
        let engine = Engine::open(tempdir.path(), Options { max_log_size: 1024 }).expect("open failed");
        Self { tempdir, engine }
    }
}

impl goldenscript::Runner for Runner {
    fn run(&mut self, command: &goldenscript::Command) -> StdResult<String, Box<dyn StdError>> {
        let mut output = String::new();
        match command.name.as_str() {
            // set key=KEY value=VALUE
            "set" => {
                let mut args = command.consume_args();
                let key: String = args.lookup_parse("key")?.ok_or("set requires key=")?;
                let value: String = args.lookup_parse("value")?.ok_or("set requires value=")?;
                args.reject_rest()?;
                self.engine.set(key.as_bytes(), value.as_bytes())?;
                output.push_str("ok\n");
            }

            // get key=KEY
            "get" => {
                let mut args = command.consume_args();
                let key: String = args.lookup_parse("key")?.ok_or("get requires key=")?;
                args.reject_rest()?;
                match self.engine.get(key.as_bytes())? {
                    Some(value) => output.push_str(&String::from_utf8_lossy(&value)),
                    None => output.push_str("None"),
                }
                output.push('\n');
            }

            // delete key=KEY
            "delete" => {
                let mut args = command.consume_args();
                let key: String = args.lookup_parse("key")?.ok_or("delete requires key=")?;
                args.reject_rest()?;
                self.engine.delete(key.as_bytes())?;
                output.push_str("ok\n");
            }

            // list_keys
            "list_keys" => {
                command.consume_args().reject_rest()?;
                let keys = self.engine.list_keys()?;
                let rendered: Vec<String> =
                    keys.iter().map(|k| String::from_utf8_lossy(k).into_owned()).collect();
                output.push_str(&rendered.join(", "));
                output.push('\n');
            }

            // sync
            "sync" => {
                command.consume_args().reject_rest()?;
                self.engine.sync()?;
                output.push_str("ok\n");
            }

            // merge
            "merge" => {
                command.consume_args().reject_rest()?;
                self.engine.merge()?;
                output.push_str("ok\n");
            }

            // reopen
            // Closes and reopens the database, exercising replay.
            "reopen" => {
                command.consume_args().reject_rest()?;
                self.engine.close()?;
                self.engine = Engine::open(self.tempdir.path(), Options { max_log_size: 1024 })?;
                output.push_str("ok\n");
            }

            // dump
            // Dumps the live keys and their values, for debugging scripts.
            "dump" => {
                command.consume_args().reject_rest()?;
                self.engine.fold(|k, v| {
                    output.push_str(&format!(
                        "{}={}\n",
                        String::from_utf8_lossy(k),
                        hex::encode(v)
                    ));
                })?;
            }

            name => return Err(format!("unknown command {name}").into()),
        }
        Ok(output)
    }
}
