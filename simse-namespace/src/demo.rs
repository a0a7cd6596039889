//! Programs built on top of the namespace: a guided tour of every operation
//! and a multi-threaded stress driver that verifies what it wrote.

use std::io::Write;
use std::time::Instant;

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::NamespaceError;
use crate::namespace::{Namespace, NamespaceOptions};
use crate::path;

// ── Tour ────────────────────────────────────────────────────────────────────

const TOUR_DIRS: &[&str] = &[
    "/home/user/documents",
    "/home/user/downloads",
    "/home/user/projects/golang",
    "/home/user/projects/python",
    "/var/log",
    "/var/cache",
    "/etc/config",
    "/tmp",
];

const TOUR_FILES: &[(&str, &str)] = &[
    ("/home/user/documents/readme.txt", "An example document"),
    ("/home/user/documents/notes.md", "# Notes\n\n- Item 1\n- Item 2\n- Item 3"),
    (
        "/home/user/projects/golang/main.go",
        "package main\n\nfunc main() {\n    println(\"Hello, World!\")\n}",
    ),
    (
        "/home/user/projects/python/app.py",
        "#!/usr/bin/env python3\n\nprint('Hello, World!')",
    ),
    ("/etc/config/app.conf", "server.port=8080\nserver.host=localhost"),
    ("/var/log/system.log", "2024-01-01 10:00:00 system started\n"),
    ("/home/user/.bashrc", "export PATH=$PATH:/usr/local/bin"),
    (
        "/home/user/.gitconfig",
        "[user]\n    name = User\n    email = user@example.com",
    ),
];

const LOG_ENTRIES: &[&str] = &[
    "2024-01-01 10:05:00 user connected",
    "2024-01-01 10:10:00 job finished",
    "2024-01-01 10:15:00 system updated",
];

const CONCURRENT_FILES: usize = 10;

/// Run the scripted tour against `ns`, printing each step to `out`.
pub fn run_tour(ns: &Namespace, out: &mut impl Write) -> anyhow::Result<()> {
    writeln!(out, "=== Namespace tour ===")?;

    tracing::debug!("tour: creating directories");
    writeln!(out, "\n1. Creating directories")?;
    for dir in TOUR_DIRS {
        ns.mkdir_all(dir, 0o755)
            .with_context(|| format!("creating {}", dir))?;
        writeln!(out, "   + {}", dir)?;
    }

    tracing::debug!("tour: writing files");
    writeln!(out, "\n2. Writing files")?;
    for (file, content) in TOUR_FILES {
        ns.write_file(file, content)
            .with_context(|| format!("writing {}", file))?;
        writeln!(out, "   + {} ({} bytes)", file, content.len())?;
    }

    let source = "/home/user/projects/golang/main.go";
    writeln!(out, "\n3. Reading {}", source)?;
    let content = ns.read_file(source)?;
    for line in String::from_utf8_lossy(&content).lines() {
        writeln!(out, "   | {}", line)?;
    }

    writeln!(out, "\n4. Appending to the log")?;
    for entry in LOG_ENTRIES {
        ns.append_file("/var/log/system.log", format!("{}\n", entry))?;
        writeln!(out, "   + {}", entry)?;
    }

    writeln!(out, "\n5. Listing directories")?;
    for dir in ["/home/user", "/home/user/projects", "/var"] {
        writeln!(out, "\n   {}:", dir)?;
        for info in ns.list_dir(dir)? {
            if info.is_dir {
                writeln!(out, "   [dir]  {:<20} (dir)", format!("{}/", info.name))?;
            } else {
                writeln!(out, "   [file] {:<20} ({} bytes)", info.name, info.size)?;
            }
        }
    }

    writeln!(out, "\n6. Metadata")?;
    for target in [
        "/home/user/documents/readme.txt",
        "/home/user/projects",
        "/var/log/system.log",
    ] {
        let info = ns.stat(target)?;
        let modified: DateTime<Utc> = info.mod_time.into();
        writeln!(out, "\n   {}:", target)?;
        writeln!(out, "   - kind:     {}", if info.is_dir { "directory" } else { "file" })?;
        writeln!(out, "   - size:     {} bytes", info.size)?;
        writeln!(out, "   - mode:     {:o}", info.mode)?;
        writeln!(out, "   - modified: {}", modified.to_rfc3339())?;
    }

    writeln!(out, "\n7. Directory sizes")?;
    for dir in ["/home/user/documents", "/home/user/projects", "/var", "/"] {
        writeln!(out, "   {}: {} bytes", dir, ns.size(dir)?)?;
    }

    writeln!(out, "\n8. Renaming")?;
    for (from, to) in [
        ("/home/user/documents/readme.txt", "/home/user/documents/README.md"),
        ("/home/user/projects/python", "/home/user/projects/python3"),
    ] {
        ns.rename(from, to)
            .with_context(|| format!("renaming {} to {}", from, to))?;
        writeln!(out, "   {} -> {}", from, to)?;
    }

    writeln!(out, "\n9. Removing")?;
    for target in ["/tmp", "/home/user/.bashrc", "/var/cache"] {
        match ns.remove(target) {
            Ok(()) => writeln!(out, "   - {}", target)?,
            Err(NamespaceError::DirectoryNotEmpty(_)) => {
                ns.remove_all(target)?;
                writeln!(out, "   - {} (recursive)", target)?;
            }
            Err(e) => return Err(e).with_context(|| format!("removing {}", target)),
        }
    }

    writeln!(out, "\n10. Tree")?;
    writeln!(out, "{}", ns.tree("/")?)?;

    writeln!(out, "\n11. Totals")?;
    let mut dirs = 0usize;
    let mut files = 0usize;
    let mut bytes = 0u64;
    ns.walk("/", |_, info| {
        if info.is_dir {
            dirs += 1;
        } else {
            files += 1;
            bytes += info.size;
        }
        Ok::<(), NamespaceError>(())
    })?;
    let average = if files == 0 { 0.0 } else { bytes as f64 / files as f64 };
    writeln!(out, "   - directories: {}", dirs)?;
    writeln!(out, "   - files:       {}", files)?;
    writeln!(out, "   - bytes:       {}", bytes)?;
    writeln!(out, "   - average:     {:.2} bytes per file", average)?;

    tracing::debug!("tour: concurrent writers and readers");
    writeln!(out, "\n12. Concurrent writes and reads")?;
    std::thread::scope(|s| {
        for n in 0..CONCURRENT_FILES {
            s.spawn(move || {
                let file = format!("/home/user/downloads/file{}.txt", n);
                if let Err(e) = ns.write_file(&file, format!("concurrent file #{}", n)) {
                    tracing::warn!(path = %file, error = %e, "concurrent write failed");
                }
            });
            s.spawn(move || {
                let file = format!("/home/user/downloads/file{}.txt", n);
                if let Err(e) = read_if_written(ns, &file) {
                    tracing::warn!(path = %file, error = %e, "concurrent read failed");
                }
            });
        }
    });
    let written = ns.list_dir("/home/user/downloads")?.len();
    writeln!(out, "   files written concurrently: {}", written)?;
    if written != CONCURRENT_FILES {
        return Err(anyhow!(
            "expected {} concurrent files, found {}",
            CONCURRENT_FILES,
            written
        ));
    }

    writeln!(out, "\n=== Tour complete ===")?;
    Ok(())
}

/// Read a file that a concurrent writer may not have created yet.
fn read_if_written(ns: &Namespace, file: &str) -> Result<Option<Vec<u8>>, NamespaceError> {
    match ns.read_file(file) {
        Ok(data) => Ok(Some(data)),
        Err(NamespaceError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

// ── Stress ──────────────────────────────────────────────────────────────────

const STRESS_ROOT: &str = "/stress";
const SHARED_DIR: &str = "/stress/shared";
const JOURNAL: &str = "/stress/journal";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StressReport {
    pub threads: usize,
    pub files_per_thread: usize,
    pub files_found: usize,
    pub files_expected: usize,
    pub bytes_found: u64,
    pub bytes_expected: u64,
    pub elapsed_ms: u64,
    /// Operation failures, as `{code, message}` objects.
    pub errors: Vec<serde_json::Value>,
    /// Verification failures after all workers finished.
    pub mismatches: Vec<String>,
}

impl StressReport {
    pub fn passed(&self) -> bool {
        self.errors.is_empty() && self.mismatches.is_empty()
    }
}

#[derive(Default)]
struct WorkerOutcome {
    bytes: u64,
    errors: Vec<NamespaceError>,
}

fn thread_dir(thread: usize) -> String {
    path::join_child(STRESS_ROOT, &format!("t{}", thread))
}

fn file_content(thread: usize, file: usize) -> String {
    format!("thread {} file {}\n", thread, file)
}

/// One worker: write, read back, journal, and move every other file into
/// the worker's own directory.
fn stress_worker(ns: &Namespace, thread: usize, files: usize) -> WorkerOutcome {
    let mut outcome = WorkerOutcome::default();
    let own_dir = thread_dir(thread);

    for file in 0..files {
        let name = format!("t{}-f{}", thread, file);
        let shared = path::join_child(SHARED_DIR, &name);
        let content = file_content(thread, file);
        let line = format!("{}\n", name);

        let result = ns
            .write_file(&shared, &content)
            .and_then(|()| ns.read_file(&shared))
            .and_then(|read| {
                if read == content.as_bytes() {
                    Ok(())
                } else {
                    Err(NamespaceError::InvalidOperation(format!(
                        "content mismatch: {}",
                        shared
                    )))
                }
            })
            .and_then(|()| ns.append_file(JOURNAL, &line))
            .and_then(|()| {
                if file % 2 == 0 {
                    ns.rename(&shared, &path::join_child(&own_dir, &name))
                } else {
                    Ok(())
                }
            });

        match result {
            Ok(()) => outcome.bytes += (content.len() + line.len()) as u64,
            Err(e) => outcome.errors.push(e),
        }
    }
    outcome
}

/// Run the stress driver on a fresh namespace and verify the final tree.
pub fn run_stress(
    options: NamespaceOptions,
    threads: usize,
    files: usize,
) -> anyhow::Result<StressReport> {
    let ns = Namespace::with_options(options);
    ns.mkdir_all(SHARED_DIR, 0o755)?;
    for thread in 0..threads {
        ns.create_dir(&thread_dir(thread), 0o755)?;
    }
    if threads > 0 && files > 0 {
        ns.write_file(JOURNAL, "")?;
    }

    tracing::info!(threads, files, "stress run starting");
    let started = Instant::now();

    let ns_ref = &ns;
    let outcomes = std::thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|thread| s.spawn(move || stress_worker(ns_ref, thread, files)))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| anyhow!("stress worker panicked"))
            })
            .collect::<anyhow::Result<Vec<WorkerOutcome>>>()
    })?;

    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let bytes_expected: u64 = outcomes.iter().map(|o| o.bytes).sum();
    let errors: Vec<serde_json::Value> = outcomes
        .iter()
        .flat_map(|o| o.errors.iter().map(NamespaceError::to_json))
        .collect();

    let mut files_found = 0;
    ns.walk(STRESS_ROOT, |_, info| {
        if !info.is_dir {
            files_found += 1;
        }
        Ok::<(), NamespaceError>(())
    })?;
    let files_expected = threads * files + usize::from(threads > 0 && files > 0);
    let bytes_found = ns.size(STRESS_ROOT)?;

    let mut mismatches = Vec::new();
    if files_found != files_expected {
        mismatches.push(format!(
            "expected {} files, found {}",
            files_expected, files_found
        ));
    }
    if bytes_found != bytes_expected {
        mismatches.push(format!(
            "expected {} bytes, found {}",
            bytes_expected, bytes_found
        ));
    }
    for thread in 0..threads {
        let moved = ns.list_dir(&thread_dir(thread))?.len();
        let expected = files.div_ceil(2);
        if moved != expected {
            mismatches.push(format!(
                "{}: expected {} moved files, found {}",
                thread_dir(thread),
                expected,
                moved
            ));
        }
    }

    tracing::info!(
        elapsed_ms,
        errors = errors.len(),
        mismatches = mismatches.len(),
        "stress run finished"
    );

    Ok(StressReport {
        threads,
        files_per_thread: files,
        files_found,
        files_expected,
        bytes_found,
        bytes_expected,
        elapsed_ms,
        errors,
        mismatches,
    })
}

/// Human-readable summary of a stress run.
pub fn write_report(report: &StressReport, out: &mut impl Write) -> anyhow::Result<()> {
    writeln!(
        out,
        "stress: {} threads x {} files in {} ms",
        report.threads, report.files_per_thread, report.elapsed_ms
    )?;
    writeln!(
        out,
        "  files: {} / {}",
        report.files_found, report.files_expected
    )?;
    writeln!(
        out,
        "  bytes: {} / {}",
        report.bytes_found, report.bytes_expected
    )?;
    for err in &report.errors {
        writeln!(out, "  error: {}", err)?;
    }
    for mismatch in &report.mismatches {
        writeln!(out, "  mismatch: {}", mismatch)?;
    }
    writeln!(
        out,
        "  result: {}",
        if report.passed() { "ok" } else { "FAILED" }
    )?;
    Ok(())
}
