use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::{SinkExt, TryStreamExt};
use tokio_postgres::Client;

use crate::config::COPY_BUFFER_SIZE;
use crate::error::{SubsetError, SubsetResult};

pub struct CopyOutResult {
    pub file_name: PathBuf,
    pub duration: Duration,
    pub file_size: u64,
}

/// Stream `COPY … TO STDOUT` into `<dir>/<table>.csv` through a buffered
/// writer, so memory use stays flat no matter the table size.
pub async fn copy_to_csv(
    client: &Client,
    table: &str,
    query: &str,
    dir: &Path,
) -> SubsetResult<CopyOutResult> {
    std::fs::create_dir_all(dir).map_err(|e| SubsetError::io(dir.display(), e))?;

    let file_name = dir.join(format!("{}.csv", table));
    let file = File::create(&file_name).map_err(|e| SubsetError::io(file_name.display(), e))?;
    let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, file);

    let started = Instant::now();
    let stream = client
        .copy_out(query)
        .await
        .map_err(|e| SubsetError::execution(query, e))?;
    futures_util::pin_mut!(stream);

    while let Some(chunk) = stream
        .try_next()
        .await
        .map_err(|e| SubsetError::execution(query, e))?
    {
        writer
            .write_all(&chunk)
            .map_err(|e| SubsetError::io(file_name.display(), e))?;
    }
    writer
        .flush()
        .map_err(|e| SubsetError::io(file_name.display(), e))?;
    let duration = started.elapsed();

    let file_size = std::fs::metadata(&file_name)
        .map_err(|e| SubsetError::io(file_name.display(), e))?
        .len();

    Ok(CopyOutResult {
        file_name,
        duration,
        file_size,
    })
}

pub struct CopyInResult {
    pub rows: u64,
    pub duration: Duration,
    pub file_size: u64,
}

/// Stream a CSV file into `COPY … FROM STDIN`. Returns the row count
/// reported by the server.
pub async fn copy_from_csv(
    client: &Client,
    query: &str,
    file_name: &Path,
) -> SubsetResult<CopyInResult> {
    let file = File::open(file_name).map_err(|e| SubsetError::io(file_name.display(), e))?;
    let file_size = file
        .metadata()
        .map_err(|e| SubsetError::io(file_name.display(), e))?
        .len();
    let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, file);

    let started = Instant::now();
    let sink = client
        .copy_in::<_, Bytes>(query)
        .await
        .map_err(|e| SubsetError::execution(query, e))?;
    futures_util::pin_mut!(sink);

    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| SubsetError::io(file_name.display(), e))?;
        if n == 0 {
            break;
        }
        sink.send(Bytes::copy_from_slice(&buf[..n]))
            .await
            .map_err(|e| SubsetError::execution(query, e))?;
    }

    let rows = sink
        .finish()
        .await
        .map_err(|e| SubsetError::execution(query, e))?;

    Ok(CopyInResult {
        rows,
        duration: started.elapsed(),
        file_size,
    })
}
