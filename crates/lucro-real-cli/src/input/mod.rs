pub mod file;
pub mod stdin;

use serde_json::Value;

/// The request body: the `--input` file if given, else piped stdin.
pub fn read_request(path: Option<&str>) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return file::read_json(path);
    }
    stdin::read_stdin()?
        .ok_or_else(|| "No input: pass --input <file> or pipe a JSON request on stdin".into())
}
