/// Interactive console for Dragon and CoCo disk images

use cocodisk::*;
use env_logger::Env;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::io::Write as _;

/// Probe order when detecting a filesystem
const PROBE_ORDER: [FileSystemType; 3] = [
    FileSystemType::Os9,
    FileSystemType::DragonDos,
    FileSystemType::RsDos,
];

/// Command completer for the REPL
struct CommandCompleter {
    commands: Vec<&'static str>,
}

impl CommandCompleter {
    fn new() -> Self {
        Self {
            commands: vec![
                "create",
                "dir",
                "exit",
                "export",
                "format",
                "free",
                "fs",
                "help",
                "info",
                "label",
                "ls",
                "open",
                "partition",
                "quit",
                "read",
                "read-lsn",
                "read-sector",
            ],
        }
    }
}

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        // Only the command name completes
        let line_to_cursor = &line[..pos];
        if line_to_cursor.contains(' ') {
            return Ok((pos, vec![]));
        }

        let prefix = line_to_cursor.to_lowercase();
        let matches: Vec<Pair> = self
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(&prefix))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();

        Ok((0, matches))
    }
}

impl Hinter for CommandCompleter {
    type Hint = String;
}

impl Highlighter for CommandCompleter {}
impl Validator for CommandCompleter {}
impl Helper for CommandCompleter {}

/// Get the path to the history file
fn history_path() -> Option<std::path::PathBuf> {
    dirs::home_dir().map(|mut p| {
        p.push(".coco_history");
        p
    })
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    println!("=== CoCo Disk ===");
    println!("Interactive console for Dragon and Tandy CoCo disk images.");
    println!("Type 'help' for available commands\n");

    let mut rl = match Editor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Failed to create editor: {}", e);
            std::process::exit(1);
        }
    };
    rl.set_helper(Some(CommandCompleter::new()));

    if let Some(history_path) = history_path() {
        let _ = rl.load_history(&history_path);
    }

    let mut image: Option<DiskImage> = None;

    loop {
        let input = match rl.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                if let Some(history_path) = history_path() {
                    let _ = rl.save_history(&history_path);
                }
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(input);

        let parts = parse_command_line(input);
        if parts.is_empty() {
            continue;
        }
        let command = parts[0].to_lowercase();

        match command.as_str() {
            "help" => print_help(),
            "quit" | "exit" => {
                if let Some(history_path) = history_path() {
                    let _ = rl.save_history(&history_path);
                }
                if let Some(img) = image.as_mut() {
                    if let Err(e) = img.flush() {
                        println!("Error: {}", e);
                    }
                }
                println!("Goodbye!");
                break;
            }
            "open" => {
                if parts.len() < 2 {
                    println!("Usage: open <path>");
                    continue;
                }
                match DiskImage::open(&parts[1]) {
                    Ok(img) => {
                        println!("Opened: {} ({})", parts[1], img.image_type());
                        image = Some(img);
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "create" => {
                if parts.len() < 4 {
                    println!("Usage: create <jvc|vdk|os9|dmk|vhd> <preset> <path>");
                    continue;
                }
                let Ok(image_type) = parts[1].parse::<DiskImageType>() else {
                    println!("Unknown image type: {}", parts[1]);
                    continue;
                };
                let Some(spec) = FormatSpec::preset(&parts[2]) else {
                    println!("Unknown preset: {}", parts[2]);
                    continue;
                };
                match DiskImage::create(&parts[3], image_type, spec) {
                    Ok(img) => {
                        println!("Created {} image {}", img.image_type(), parts[3]);
                        image = Some(img);
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "info" => match image.as_ref() {
                Some(img) => print_info(img),
                None => println!("No image loaded. Use 'open <path>' or 'create' first."),
            },
            "partition" => {
                let Some(img) = image.as_mut() else {
                    println!("No image loaded.");
                    continue;
                };
                if parts.len() < 2 {
                    println!(
                        "Partition {} of {}",
                        img.current_partition(),
                        img.partitions()
                    );
                    continue;
                }
                match parse_number(&parts[1]) {
                    Some(index) => match img.select_partition(index) {
                        Ok(()) => println!("Selected partition {}: {}", index, img.geometry()),
                        Err(e) => println!("Error: {}", e),
                    },
                    None => println!("Usage: partition [n]"),
                }
            }
            "read-sector" => {
                let Some(img) = image.as_mut() else {
                    println!("No image loaded.");
                    continue;
                };
                let numbers: Vec<Option<u32>> = parts[1..].iter().map(|p| parse_number(p)).collect();
                let (track, head, sector) = match numbers.as_slice() {
                    [Some(t), Some(h), Some(s)] => (*t, *h, *s),
                    _ => {
                        println!("Usage: read-sector <track> <head> <sector>");
                        continue;
                    }
                };
                match img.read_sector(track as u16, head as u8, sector as u16) {
                    Ok(data) => {
                        println!("Sector {}:{}:{} ({} bytes):", track, head, sector, data.len());
                        print_hex_dump(&data, 256);
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "read-lsn" => {
                let Some(img) = image.as_mut() else {
                    println!("No image loaded.");
                    continue;
                };
                let Some(lsn) = parts.get(1).and_then(|p| parse_number(p)) else {
                    println!("Usage: read-lsn <lsn>");
                    continue;
                };
                match img.read_lsn(lsn) {
                    Ok(data) => {
                        println!("LSN {} ({} bytes):", lsn, data.len());
                        print_hex_dump(&data, 256);
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "fs" | "free" | "dir" | "ls" | "read" | "export" | "label" | "format" => {
                let Some(img) = image.as_mut() else {
                    println!("No image loaded.");
                    continue;
                };
                if let Err(e) = run_filesystem_command(img, &command, &parts[1..]) {
                    println!("Error: {}", e);
                }
            }
            _ => {
                println!("Unknown command: {}. Type 'help' for commands.", command);
            }
        }
    }
}

/// First filesystem that validates on the selected volume
fn detect_filesystem(image: &mut DiskImage) -> Option<FileSystemType> {
    PROBE_ORDER
        .into_iter()
        .find(|&fs_type| filesystem::probe(image, fs_type))
}

fn run_filesystem_command(image: &mut DiskImage, command: &str, args: &[String]) -> Result<()> {
    if command == "format" {
        let Some(fs_type) = args.first().and_then(|a| a.parse::<FileSystemType>().ok()) else {
            println!("Usage: format <os9|dragon|rsdos>");
            return Ok(());
        };
        let mut progress = |track: u16, head: u8| {
            if head == 0 && track % 5 == 0 {
                print!(".");
                let _ = std::io::stdout().flush();
            }
        };
        let mut fs = filesystem::format(image, fs_type, &mut progress)?;
        println!();
        println!("Formatted as {}; {} bytes free", fs_type, fs.free_space()?);
        return Ok(());
    }

    let fs_type = detect_filesystem(image).ok_or_else(|| {
        DiskError::invalid_format("no OS-9, DragonDOS or RS-DOS filesystem found")
    })?;
    let mut fs = filesystem::mount(image, fs_type)?;

    match command {
        "fs" => {
            let info = fs.info()?;
            println!("{} filesystem", info.fs_type);
            if !info.label.is_empty() {
                println!("Label: {}", info.label);
            }
            println!("Block size: {} bytes", info.block_size);
            println!("Total blocks: {}", info.total_blocks);
            println!(
                "Total capacity: {} KB",
                info.total_blocks * info.block_size / 1024
            );
            println!("Free space: {} KB", info.free_bytes / 1024);
        }
        "free" => {
            println!("{} bytes free", fs.free_space()?);
        }
        "dir" | "ls" => {
            let lsn = args.first().and_then(|a| parse_number(a)).unwrap_or(0);
            let directory = fs.get_directory(lsn)?;
            print_directory(&directory);
        }
        "read" => {
            let Some(name) = args.first() else {
                println!("Usage: read <filename>");
                return Ok(());
            };
            let data = fs.read_file_by_name(name)?;
            println!("File: {} ({} bytes)", name, data.len());
            print_hex_dump(&data, 256);
        }
        "export" => {
            let Some(name) = args.first() else {
                println!("Usage: export <filename> [output_path]");
                return Ok(());
            };
            let output = args.get(1).unwrap_or(name);
            let data = fs.read_file_by_name(name)?;
            std::fs::write(output, &data)?;
            println!("Exported {} ({} bytes) to {}", name, data.len(), output);
        }
        "label" => match args.first() {
            Some(label) => {
                fs.set_disk_label(label)?;
                println!("Label set to {}", label);
            }
            None => println!("Label: {}", fs.disk_label()?),
        },
        _ => {}
    }
    Ok(())
}

fn parse_command_line(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
            }
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    parts.push(current.clone());
                    current.clear();
                }
            }
            _ => {
                current.push(ch);
            }
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

fn parse_number(s: &str) -> Option<u32> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = s.strip_prefix('$') {
        u32::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  open <path>                    - Open a disk image (use quotes for paths with spaces)");
    println!("  create <type> <preset> <path>  - Create a blank image (types: jvc vdk os9 dmk vhd)");
    println!("                                   (presets: rsdos35 rsdos40 dragon40 dragon40ds dragon80");
    println!("                                    os935 os940 os980)");
    println!("  info                           - Show image information");
    println!("  partition [n]                  - Show or select a hard disk partition");
    println!("  read-sector <t> <h> <s>        - Hex dump a sector");
    println!("  read-lsn <lsn>                 - Hex dump a logical sector");
    println!("  fs                             - Detect the filesystem and show its details");
    println!("  dir [lsn]                      - List a directory (OS-9 directories by LSN)");
    println!("  read <filename>                - Hex dump a file");
    println!("  export <file> [output_path]    - Copy a file to the host filesystem");
    println!("  free                           - Show free space");
    println!("  label [text]                   - Show or set the volume label");
    println!("  format <os9|dragon|rsdos>      - Write an empty filesystem");
    println!("  help                           - Show this help");
    println!("  quit, exit                     - Exit");
}

fn print_info(image: &DiskImage) {
    let geometry = image.geometry();
    println!("Type: {}", image.image_type());
    println!("Valid: {}", if image.is_valid() { "Yes" } else { "No" });
    println!("Sides: {}", geometry.heads);
    println!("Tracks per side: {}", geometry.tracks);
    println!("Sectors per track: {}", geometry.sectors_per_track);
    println!("Sector size: {} bytes", geometry.sector_size);
    println!("Header length: {} bytes", image.header_length());
    println!("Interleave: {}", image.interleave());
    if let Some(header) = image.jvc_header() {
        println!("First sector ID: {}", header.first_sector_id);
    }
    if let Some(track_length) = image.dmk_track_length() {
        println!("DMK track length: 0x{:04X}", track_length);
    }
    if image.is_partitioned() {
        println!(
            "Partition: {} of {}",
            image.current_partition(),
            image.partitions()
        );
    }
    println!("Total capacity: {} KB", image.total_capacity() / 1024);
    println!("Changed: {}", if image.is_changed() { "Yes" } else { "No" });
}

fn print_directory(directory: &Directory) {
    if directory.is_empty() {
        println!("No files found.");
        return;
    }
    println!("{:<30} {:>8} {:<10} {}", "Name", "Size", "Attr", "Detail");
    println!("{}", "-".repeat(64));

    for entry in directory {
        let (attributes, detail) = match &entry.detail {
            EntryDetail::Os9(os9) => (
                os9.descriptor.attributes.to_string(),
                format!("FD at LSN {}", os9.descriptor_lsn),
            ),
            EntryDetail::RsDos(rsdos) => (
                if rsdos.is_ascii() { "ASCII" } else { "Binary" }.to_string(),
                rsdos.type_name().to_string(),
            ),
            EntryDetail::DragonDos(dragon) => (
                if dragon.is_protected() { "P" } else { "-" }.to_string(),
                format!("{} blocks", dragon.blocks.len()),
            ),
        };
        println!(
            "{:<30} {:>8} {:<10} {}{}",
            entry.name,
            entry.size(),
            attributes,
            detail,
            if entry.deleted { " (deleted)" } else { "" }
        );
    }
}

fn print_hex_dump(data: &[u8], max_bytes: usize) {
    let len = data.len().min(max_bytes);

    for (i, chunk) in data[..len].chunks(16).enumerate() {
        print!("{:04X}: ", i * 16);

        for (j, byte) in chunk.iter().enumerate() {
            print!("{:02X} ", byte);
            if j == 7 {
                print!(" ");
            }
        }

        // Pad a short last line
        for j in chunk.len()..16 {
            print!("   ");
            if j == 7 {
                print!(" ");
            }
        }

        print!(" |");
        for byte in chunk {
            let c = if (32..127).contains(byte) {
                *byte as char
            } else {
                '.'
            };
            print!("{}", c);
        }
        println!("|");
    }

    if data.len() > max_bytes {
        println!("... ({} more bytes)", data.len() - max_bytes);
    }
}
