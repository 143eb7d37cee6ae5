use std::process;

fn main() {
    match confluence_cli::run() {
        Ok(code) => process::exit(code as i32),
        Err(err) => {
            eprintln!("confluence-attach error: {err:#}");
            process::exit(confluence_cli::ExitCode::Failure as i32);
        }
    }
}
