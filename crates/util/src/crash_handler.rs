use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::io::Write;
use std::panic::UnwindSafe;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::thread::ThreadId;

#[derive(Clone)]
pub struct CrashInfo
{
    thread_name:    String,
    panic_location: String,
    panic_time:     chrono::DateTime<chrono::Local>,
    backtrace:      backtrace::Backtrace,
    message:        Cow<'static, str>
}

impl CrashInfo
{
    pub fn get_message(&self) -> &str
    {
        &self.message
    }
}

impl Debug for CrashInfo
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        write!(
            f,
            "Thread {} has crashed @ [{}] and {} with message: {} \n {:?}",
            self.thread_name,
            super::format_chrono_time(self.panic_time),
            self.panic_location,
            self.message,
            self.backtrace
        )
    }
}

impl Display for CrashInfo
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        write!(
            f,
            "Thread {} has crashed @ [{}] and {} with message: {}",
            self.thread_name,
            super::format_chrono_time(self.panic_time),
            self.panic_location,
            self.message
        )
    }
}

pub fn panic_payload_as_cow(payload: &(dyn Any + Send)) -> Cow<'static, str>
{
    if let Some(s) = payload.downcast_ref::<&'static str>()
    {
        Cow::Borrowed(*s)
    }
    else if let Some(s) = payload.downcast_ref::<String>()
    {
        Cow::Owned(s.clone())
    }
    else if let Some(s) = payload.downcast_ref::<Box<dyn Any + Send>>()
    {
        panic_payload_as_cow(&**s)
    }
    else
    {
        Cow::Owned(format!("Unknown {:#?}", Any::type_id(payload)))
    }
}

static THREAD_CRASH_INFOS: OnceLock<Mutex<HashMap<ThreadId, CrashInfo>>> = OnceLock::new();

/// Runs `func` with a panic hook that records a `CrashInfo` per crashed
/// thread. Returns the infos and writes `<report_prefix>-<time>.txt` when `func`
/// panicked.
pub fn handle_crashes<T>(
    report_prefix: &str,
    func: impl FnOnce() -> T + UnwindSafe
) -> Result<T, Vec<CrashInfo>>
{
    let crash_infos = THREAD_CRASH_INFOS.get_or_init(|| Mutex::new(HashMap::new()));

    std::panic::set_hook(Box::new(move |panic_info| {
        let thread = std::thread::current();

        let panic_location = panic_info
            .location()
            .map(|l| {
                let file = l.file().replace('\\', "/");

                format!("[{}:{}]", super::prettify_file_path(&file), l.line())
            })
            .unwrap_or_else(|| "[???]".into());

        log::error!(
            "BLOCK_ON Thread {} has panicked",
            thread.name().unwrap_or("???")
        );

        if let Some(infos) = THREAD_CRASH_INFOS.get()
        {
            if let Ok(mut guard) = infos.lock()
            {
                guard.insert(
                    thread.id(),
                    CrashInfo {
                        thread_name: thread.name().unwrap_or("???").to_string(),
                        panic_location,
                        panic_time: chrono::Local::now(),
                        backtrace: backtrace::Backtrace::new(),
                        message: panic_payload_as_cow(panic_info.payload())
                    }
                );
            }
        }
    }));

    let result = std::panic::catch_unwind(func);

    let _ = std::panic::take_hook();

    let mut local_crash_infos: Vec<CrashInfo> = match crash_infos.lock()
    {
        Ok(mut guard) => guard.drain().map(|(_, c)| c).collect(),
        Err(poisoned) => poisoned.into_inner().drain().map(|(_, c)| c).collect()
    };

    local_crash_infos.sort_by(|l, r| l.panic_time.cmp(&r.panic_time));

    match result
    {
        Ok(t) if local_crash_infos.is_empty() => Ok(t),
        _ =>
        {
            local_crash_infos.iter().for_each(|c| log::error!("{}", c));

            if let Err(e) = write_crash_report(report_prefix, &local_crash_infos)
            {
                log::error!("Failed to write crash report: {e}");
            }

            Err(local_crash_infos)
        }
    }
}

fn write_crash_report(report_prefix: &str, infos: &[CrashInfo]) -> std::io::Result<PathBuf>
{
    let time = super::format_chrono_time(chrono::Local::now()).replace(['/', ':', ' '], "_");
    let path = PathBuf::from(format!("{report_prefix}-{time}.txt"));

    let mut crash_file = std::fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .open(&path)?;

    for c in infos
    {
        writeln!(crash_file, "{:?}", c)?;
    }

    Ok(path)
}
