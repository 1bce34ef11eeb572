/// Vulkan validation messages - debug messenger callback with colored output
///
/// Messages are filtered by the `DeviceConfig` debug settings, counted when
/// statistics are enabled, and written to the console and/or a log file.

use ash::vk;
use colored::*;
use galaxy_3d_runtime::galaxy3d::device::{
    DebugMessageFilter, DebugOutput, DebugSeverity, DeviceConfig, ValidationStats,
};
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Active debug configuration (None when no messenger is installed)
static DEBUG_CONFIG: Mutex<Option<DebugConfig>> = Mutex::new(None);

static VALIDATION_STATS: ValidationCounters = ValidationCounters::new();

/// Occurrences of each message text, for the repeat indicator
static MESSAGE_COUNTS: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Settings read by the messenger callback
#[derive(Debug, Clone)]
pub(crate) struct DebugConfig {
    pub severity: DebugSeverity,
    pub output: DebugOutput,
    pub message_filter: DebugMessageFilter,
    pub break_on_error: bool,
    pub panic_on_error: bool,
    pub enable_stats: bool,
}

impl From<&DeviceConfig> for DebugConfig {
    fn from(config: &DeviceConfig) -> Self {
        Self {
            severity: config.debug_severity,
            output: config.debug_output.clone(),
            message_filter: config.debug_message_filter,
            break_on_error: config.break_on_validation_error,
            panic_on_error: config.panic_on_error,
            enable_stats: config.enable_validation_stats,
        }
    }
}

struct ValidationCounters {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationCounters {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn count(&self, severity: vk::DebugUtilsMessageSeverityFlagsEXT) {
        let counter = if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            &self.errors
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            &self.warnings
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            &self.info
        } else {
            &self.verbose
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.verbose.store(0, Ordering::Relaxed);
    }
}

/// Install the configuration read by the callback and reset the counters
pub(crate) fn init_debug_config(config: DebugConfig) {
    VALIDATION_STATS.reset();
    if let Ok(mut counts) = MESSAGE_COUNTS.lock() {
        *counts = Some(FxHashMap::default());
    }
    if let Ok(mut guard) = DEBUG_CONFIG.lock() {
        *guard = Some(config);
    }
}

/// Stop processing messages (the messenger is about to be destroyed)
pub(crate) fn cleanup_debug_config() {
    if let Ok(mut guard) = DEBUG_CONFIG.lock() {
        *guard = None;
    }
}

/// Messenger severity flags for a severity setting
pub(crate) fn severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    let errors = vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
    let warnings = errors | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING;
    match severity {
        DebugSeverity::ErrorsOnly => errors,
        DebugSeverity::ErrorsAndWarnings => warnings,
        DebugSeverity::All => {
            warnings
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        }
    }
}

fn category_enabled(filter: &DebugMessageFilter, message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> bool {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        filter.show_validation
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        filter.show_performance
    } else {
        filter.show_general
    }
}

fn type_name(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

fn severity_label(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> (&'static str, ColoredString) {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        ("ERROR", "ERROR".red().bold())
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        ("WARNING", "WARNING".yellow().bold())
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        ("INFO", "INFO".cyan())
    } else {
        ("VERBOSE", "VERBOSE".bright_black())
    }
}

/// How many times `message` has been seen (1 on first occurrence)
fn track_message(message: &str) -> u32 {
    let Ok(mut guard) = MESSAGE_COUNTS.lock() else {
        return 1;
    };
    let counts = guard.get_or_insert_with(FxHashMap::default);
    let count = counts.entry(message.to_string()).or_insert(0);
    *count += 1;
    *count
}

/// Current validation message counters
pub fn get_validation_stats() -> ValidationStats {
    VALIDATION_STATS.snapshot()
}

/// Print the validation counters to stdout
pub fn print_validation_stats_report() {
    let stats = get_validation_stats();

    if stats.total() == 0 {
        println!("\n{}", "✓ No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());
    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        println!("  {} {}", "Info:".cyan(), stats.info);
    }
    if stats.verbose > 0 {
        println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
    }
    println!("  {} {}", "Total:".white().bold(), stats.total());

    let repeated = MESSAGE_COUNTS
        .lock()
        .ok()
        .and_then(|guard| guard.as_ref().map(|counts| counts.values().filter(|&&c| c > 1).count()))
        .unwrap_or(0);
    if repeated > 0 {
        println!("\n  {} {} message(s) appeared multiple times", "ℹ".cyan(), repeated);
    }

    println!("{}\n", "====================================".bright_blue().bold());
}

unsafe fn c_str_or<'a>(ptr: *const std::os::raw::c_char, fallback: &'a str) -> &'a str {
    if ptr.is_null() {
        fallback
    } else {
        CStr::from_ptr(ptr).to_str().unwrap_or("Invalid UTF-8")
    }
}

/// Debug messenger callback installed when validation is enabled
///
/// # Safety
///
/// Called by the Vulkan loader with valid callback data.
pub(crate) unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let config = match DEBUG_CONFIG.lock() {
        Ok(guard) => match guard.as_ref() {
            Some(config) => config.clone(),
            None => return vk::FALSE,
        },
        Err(_) => return vk::FALSE,
    };

    if !severity_flags(config.severity).intersects(message_severity)
        || !category_enabled(&config.message_filter, message_type)
    {
        return vk::FALSE;
    }

    let callback_data = &*p_callback_data;
    let message_id_name = c_str_or(callback_data.p_message_id_name, "Unknown");
    let message = c_str_or(callback_data.p_message, "No message");

    let (severity_str, severity_colored) = severity_label(message_severity);
    let type_str = type_name(message_type);

    let occurrence = if config.enable_stats {
        VALIDATION_STATS.count(message_severity);
        track_message(message)
    } else {
        1
    };
    let repeat_indicator = if occurrence > 1 {
        format!(" [×{}]", occurrence)
    } else {
        String::new()
    };

    let console_output = format!(
        "{} {} [{}]{}\n  ├─ {}: {}\n  └─ {}\n",
        "[VULKAN".bright_blue().bold(),
        format!("{}]", severity_colored).bright_blue().bold(),
        type_str.bright_black(),
        repeat_indicator.yellow(),
        "Message ID".bright_black(),
        message_id_name.white(),
        message.white()
    );
    let file_output = format!(
        "[VULKAN {}] [{}]{}\n  ├─ Message ID: {}\n  └─ {}\n",
        severity_str, type_str, repeat_indicator, message_id_name, message
    );

    match &config.output {
        DebugOutput::Console => eprint!("{}", console_output),
        DebugOutput::File(path) => write_to_file(path, &file_output),
        DebugOutput::Both(path) => {
            eprint!("{}", console_output);
            write_to_file(path, &file_output);
        }
    }

    let is_error = message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR);
    if is_error && config.panic_on_error {
        panic!(
            "Vulkan validation error (panic_on_error)\nMessage ID: {}\nType: {}\nMessage: {}",
            message_id_name, type_str, message
        );
    }
    if is_error && config.break_on_error {
        eprintln!(
            "\n{}\n  Context: {} [{}]\n  Message: {}\n",
            "BREAK ON VALIDATION ERROR - Aborting execution".red().bold(),
            message_id_name.yellow(),
            type_str.cyan(),
            message.white()
        );
        std::process::abort();
    }

    vk::FALSE
}

fn write_to_file(path: &str, message: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{}", message);
    }
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
