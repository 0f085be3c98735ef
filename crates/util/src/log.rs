use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// `log` backend that formats on the calling thread and writes on a worker.
///
/// Messages prefixed with `BLOCK_ON` are printed synchronously and never
/// reach the log file.
#[derive(Debug)]
pub struct AsyncLogger
{
    thread_sender: Mutex<Option<Sender<String>>>,
    should_stop:   Arc<AtomicBool>,
    worker_thread: Mutex<Option<JoinHandle<()>>>
}

impl AsyncLogger
{
    pub fn new(log_path: impl Into<PathBuf>) -> std::io::Result<Self>
    {
        let mut log_file = std::fs::OpenOptions::new()
            .read(false)
            .write(true)
            .append(false)
            .truncate(true)
            .create(true)
            .open(log_path.into())?;

        let (thread_sender, receiver) = mpsc::channel::<String>();
        let should_stop = Arc::new(AtomicBool::new(false));

        let thread_should_stop = should_stop.clone();
        let worker_thread = std::thread::Builder::new()
            .name("Hexane AsyncLogger Thread".into())
            .spawn(move || {
                let mut write_fn = |message: String| {
                    println!("{}", message);

                    if let Err(e) = writeln!(log_file, "{}", message)
                    {
                        eprintln!("Failed to write to log file: {e}");
                    }
                };

                loop
                {
                    if thread_should_stop.load(Ordering::Acquire)
                    {
                        break;
                    }

                    match receiver.recv_timeout(Duration::from_millis(50))
                    {
                        Ok(message) => write_fn(message),
                        Err(mpsc::RecvTimeoutError::Disconnected) => break,
                        Err(mpsc::RecvTimeoutError::Timeout) =>
                        {}
                    }
                }

                // cleanup loop
                loop
                {
                    match receiver.try_recv()
                    {
                        Ok(message) => write_fn(message),
                        Err(TryRecvError::Empty | TryRecvError::Disconnected) => break
                    }
                }
            })?;

        Ok(AsyncLogger {
            thread_sender: Mutex::new(Some(thread_sender)),
            worker_thread: Mutex::new(Some(worker_thread)),
            should_stop
        })
    }

    /// Flushes everything queued so far and joins the worker. Messages logged
    /// afterwards go to stderr.
    pub fn stop_worker(&self)
    {
        self.should_stop.store(true, Ordering::Release);

        if let Ok(mut sender) = self.thread_sender.lock()
        {
            sender.take();
        }

        let stolen_worker = self
            .worker_thread
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());

        if let Some(worker) = stolen_worker
        {
            if worker.join().is_err()
            {
                eprintln!("AsyncLogger worker panicked");
            }
        }
    }
}

impl log::Log for AsyncLogger
{
    /// Doing this means that the log crate manages the level itself
    fn enabled(&self, _metadata: &log::Metadata) -> bool
    {
        true
    }

    fn log(&self, record: &log::Record)
    {
        // Silencing useless messages in 3rd party libs
        if let Some(true) = record.file().map(|f| f.contains(".cargo"))
        {
            if record.level() >= log::Level::Info
            {
                return;
            }
        }

        let working_time_string = format_chrono_time(chrono::Local::now());

        let file_path: String;

        if let (Some(file), Some(line), true) = (
            record.file().map(|s| s.replace('\\', "/")),
            record.line(),
            cfg!(debug_assertions)
        )
        {
            file_path = format!("[{}:{line}] ", prettify_file_path(&file));
        }
        else
        {
            file_path = "".into();
        }

        let user_message = format!("{}", record.args());

        const BLOCK_ON_STR: &str = "BLOCK_ON";

        if let Some(stripped) = user_message.strip_prefix(BLOCK_ON_STR)
        {
            println!(
                "[{}] {}[{}] {}",
                working_time_string,
                file_path,
                record.level(),
                stripped
            );

            return;
        }

        let formatted = format!(
            "[{}] {}[{}] {}",
            working_time_string,
            file_path,
            record.level(),
            user_message
        );

        let maybe_unsent = match self.thread_sender.lock()
        {
            Ok(guard) =>
            {
                match &*guard
                {
                    Some(sender) => sender.send(formatted).err().map(|e| e.0),
                    None => Some(formatted)
                }
            }
            Err(_) => Some(formatted)
        };

        if let Some(unsent_string) = maybe_unsent
        {
            eprintln!("Send after async shutdown! {}", unsent_string);
        }
    }

    fn flush(&self) {}
}

/// Strips the registry prefix off paths into `~/.cargo`.
pub fn prettify_file_path(file: &str) -> &str
{
    match file.find("index.crates.io-")
    {
        Some(idx) =>
        {
            match file[idx..].find('/')
            {
                Some(idx_of_next_slash) => &file[idx_of_next_slash + idx + 1..],
                None => file
            }
        }
        None => file
    }
}

pub fn format_chrono_time(time: chrono::DateTime<chrono::Local>) -> String
{
    time.format("%b %m/%d/%Y %H:%M:%S%.6f").to_string()
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn prettify_strips_registry()
    {
        assert_eq!(
            prettify_file_path(
                "/home/a/.cargo/registry/src/index.crates.io-6f17d22bba15001f/wgpu-0.20.1/src/lib.rs"
            ),
            "wgpu-0.20.1/src/lib.rs"
        );
        assert_eq!(prettify_file_path("crates/voxel/src/heap.rs"), "crates/voxel/src/heap.rs");
    }
}
