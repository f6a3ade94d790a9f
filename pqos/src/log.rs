/*
 * Copyright 2024 Fluence Labs Limited
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::fs::File;
use std::io;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::config::LogSink;
use crate::config::Logs;
use crate::errors::PqosError;
use crate::PqosResult;

static LOG_SINK: OnceCell<()> = OnceCell::new();

/// Installs the process-wide subscriber on the first call; later calls and
/// subscribers installed by the embedding application win silently.
pub(crate) fn setup(logs: &Logs) -> PqosResult<()> {
    LOG_SINK
        .get_or_try_init(|| -> io::Result<()> {
            let writer = make_writer(&logs.sink)?;
            let _ = tracing_subscriber::fmt()
                .with_max_level(logs.effective_level())
                .with_writer(writer)
                .try_init();
            Ok(())
        })
        .map_err(PqosError::LogSink)?;

    Ok(())
}

fn make_writer(sink: &LogSink) -> io::Result<BoxMakeWriter> {
    let writer = match sink {
        LogSink::Stderr => BoxMakeWriter::new(io::stderr),
        LogSink::Stdout => BoxMakeWriter::new(io::stdout),
        LogSink::File(path) => {
            let file = File::options().create(true).append(true).open(path)?;
            let file = Arc::new(file);
            BoxMakeWriter::new(move || FileWriter(file.clone()))
        }
    };

    Ok(writer)
}

struct FileWriter(Arc<File>);

impl io::Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self.0).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self.0).flush()
    }
}
