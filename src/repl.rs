use crate::command::Command;
use crate::error::{Error, Result};
use crate::execute::execute_command;
use crate::hash::KeyHasher;
use crate::hash_file::HashFile;
use crate::setup::{setup_db, SetupOptions};
use tokio::io::{stdin, stdout, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::select;
use tokio::sync::oneshot;
use tracing::debug;

pub async fn run_repl(options: &SetupOptions) -> Result<()> {
    let mut store = setup_db(options)?;

    // A task waits for ctrl-c and fires the oneshot, the loop below selects
    // between the next line and that signal
    let (sender, mut receiver) = oneshot::channel::<()>();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = sender.send(());
        }
    });

    let mut out = stdout();
    let mut lines = BufReader::new(stdin()).lines();
    write_line(&mut out, "Welcome to Extendible KV!").await?;
    let mut watching_ctrl_c = true;
    loop {
        out.write_all(b"> ").await.map_err(Error::Write)?;
        out.flush().await.map_err(Error::Write)?;
        select! {
            signal = &mut receiver, if watching_ctrl_c => {
                if signal.is_ok() {
                    debug!("received ctrl-c");
                    break;
                }
                // no handler could be installed
                watching_ctrl_c = false;
            }
            input = lines.next_line() => {
                let Some(line) = input.map_err(Error::Read)? else {
                    break;
                };
                if execute_user_input(&mut store, &line, &mut out).await? {
                    break;
                }
            }
        }
    }
    store.close()?;
    write_line(&mut out, "Goodbye!").await
}

/// Parses and runs one line, writing the answer or the error to `out`
///
/// Returns true once the user asked to exit. Failing commands are reported
/// and the session carries on.
pub(crate) async fn execute_user_input<H: KeyHasher, W: AsyncWrite + Unpin>(
    store: &mut HashFile<H>,
    input: &str,
    out: &mut W,
) -> Result<bool> {
    if input.trim().is_empty() {
        return Ok(false);
    }
    let cmd = match input.parse::<Command>() {
        Ok(cmd) => cmd,
        Err(err) => {
            write_line(out, &format!("Error: {}", err)).await?;
            return Ok(false);
        }
    };
    let should_quit = cmd == Command::Exit;
    match execute_command(store, cmd) {
        Ok(output) => write_line(out, &output).await?,
        Err(err) => write_line(out, &format!("Error: {}", err)).await?,
    }
    Ok(should_quit)
}

async fn write_line<W: AsyncWrite + Unpin>(out: &mut W, line: &str) -> Result<()> {
    out.write_all(line.as_bytes()).await.map_err(Error::Write)?;
    if !line.ends_with('\n') {
        out.write_all(b"\n").await.map_err(Error::Write)?;
    }
    out.flush().await.map_err(Error::Write)
}
