use crate::error::{Error, Result};
use crate::hash::KeyHasher;
use crate::hash_file::HashFile;
use crate::repl::execute_user_input;
use crate::setup::{setup_db, SetupOptions};

use tokio::select;
use tokio::{
    io::{stdin, stdout, AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader},
    sync::{mpsc, oneshot},
};
use tracing::{debug, warn};

/// Runs every line piped into stdin as a command, closing the store at the
/// end of input, on `EXIT` or on ctrl-c
pub async fn process_from_stdin(options: &SetupOptions) -> Result<()> {
    let mut store = setup_db(options)?;
    let (send, mut recv) = mpsc::channel::<String>(100);
    let (ctrlc_send, mut ctrlc_recv) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = ctrlc_send.send(());
        }
    });

    let read_task = tokio::spawn(async move {
        if let Err(err) = read_line_from_stdin(BufReader::new(stdin()), &send).await {
            warn!(%err, "failed to read stdin");
        }
    });

    let result = process_lines(&mut store, &mut recv, &mut ctrlc_recv, &mut stdout()).await;
    read_task.abort();
    result
}

async fn process_lines<H: KeyHasher, W: AsyncWrite + Unpin>(
    store: &mut HashFile<H>,
    receiver: &mut mpsc::Receiver<String>,
    ctrlc_signal: &mut oneshot::Receiver<()>,
    out: &mut W,
) -> Result<()> {
    let mut watching_ctrl_c = true;
    loop {
        select! {
            signal = &mut *ctrlc_signal, if watching_ctrl_c => {
                if signal.is_ok() {
                    debug!("received ctrl-c");
                    break;
                }
                watching_ctrl_c = false;
            }
            line = receiver.recv() => {
                let Some(line) = line else {
                    break;
                };
                if execute_user_input(store, &line, out).await? {
                    break;
                }
            }
        }
    }
    store.close()
}

async fn read_line_from_stdin<R: AsyncRead + Unpin>(
    reader: BufReader<R>,
    send: &mpsc::Sender<String>,
) -> Result<()> {
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.map_err(Error::Read)? {
        if send.send(line).await.is_err() {
            // processing stopped, nobody is listening
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HashFileConfig;
    use crate::record::Key;
    use tempfile::tempdir;

    #[tokio::test]
    async fn pipes_lines_through_the_store() {
        let dir = tempdir().unwrap();
        let name = dir.path().join("piped");
        let mut store = HashFile::new(HashFileConfig::new());
        store.create(&name).unwrap();

        let input: &[u8] = b"PUT 1 \"one\"\nPUT 2 \"two\"\nGET 2\nDELETE 1\nGET 1\n";
        let (send, mut recv) = mpsc::channel::<String>(100);
        read_line_from_stdin(BufReader::new(input), &send).await.unwrap();
        drop(send);

        let (_ctrlc_send, mut ctrlc_recv) = oneshot::channel::<()>();
        let mut out = Vec::new();
        process_lines(&mut store, &mut recv, &mut ctrlc_recv, &mut out)
            .await
            .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "OK\nOK\ntwo\nOK\nKey 1 not found\n"
        );
        assert!(!store.is_open());

        store.open(&name).unwrap();
        let two = store.retrieve(&Key::try_from("2").unwrap()).unwrap();
        assert_eq!(two.unwrap().to_string(), "two");
    }

    #[tokio::test]
    async fn exit_stops_processing() {
        let dir = tempdir().unwrap();
        let mut store = HashFile::new(HashFileConfig::new());
        store.create(dir.path().join("exit")).unwrap();

        let (send, mut recv) = mpsc::channel::<String>(10);
        send.send("EXIT".to_string()).await.unwrap();
        send.send("PUT 1 \"never\"".to_string()).await.unwrap();

        let (_ctrlc_send, mut ctrlc_recv) = oneshot::channel::<()>();
        let mut out = Vec::new();
        process_lines(&mut store, &mut recv, &mut ctrlc_recv, &mut out)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Bye\n");
    }
}
