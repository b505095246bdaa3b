//! # Process image
//!
//! Symbolication of the running executable from its own file: the symbol
//! table for function names and DWARF (through `addr2line`) for inlined
//! functions and source locations.
//!
//! The image is parsed once. Lookups never touch the unwinder, so a slow
//! symbolication (the first DWARF unit parse, say) does not hold up other
//! threads' stack walks or cache hits.
//!
//! ## Load bias
//!
//! Position-independent executables are mapped at a random base. The bias is
//! measured from a function of this module: its runtime address minus its
//! address in the symbol table. Stripped binaries have no such symbol and
//! fail to load; callers then fall back to the unwinder's symbolizer.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::{env, fs, io};

use addr2line::Context;
use gimli::{Dwarf, EndianArcSlice, RunTimeEndian, SectionId};
use object::{Object, ObjectSection, ObjectSegment, ObjectSymbol, SymbolKind};
use once_cell::sync::Lazy;
use rustc_demangle::try_demangle;
use thiserror::Error;
use tracing::debug;

use crate::types::SymbolRecord;

type OwnedReader = EndianArcSlice<RunTimeEndian>;

/// Function whose address calibrates the load bias.
const REFERENCE_SYMBOL: &str = "callerid_core::symbols::image::load_process_image";

static PROCESS_IMAGE: Lazy<Option<ProcessImage>> = Lazy::new(load_process_image);

/// The running executable's image, parsed on first use.
pub fn process_image() -> Option<&'static ProcessImage>
{
    PROCESS_IMAGE.as_ref()
}

#[inline(never)]
fn load_process_image() -> Option<ProcessImage>
{
    let reference: fn() -> Option<ProcessImage> = load_process_image;
    match ProcessImage::from_current_exe(reference as usize) {
        Ok(image) => {
            debug!(
                symbols = image.symbols.len(),
                debug_info = image.context.is_some(),
                "loaded process image"
            );
            Some(image)
        }
        Err(err) => {
            debug!("process image unavailable, symbolicating through the unwinder: {err}");
            None
        }
    }
}

/// Why the process image could not be loaded.
#[derive(Error, Debug)]
pub enum ImageError
{
    /// The executable could not be located or read
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The executable is not an object file `object` understands
    #[error("Failed to parse executable: {0}")]
    Object(#[from] object::Error),

    /// The symbol table lacks the calibration function (stripped binary)
    #[error("Symbol `{0}` not found; cannot compute load bias")]
    MissingReference(&'static str),

    /// DWARF sections are present but unusable
    #[error("Failed to load DWARF: {0}")]
    Dwarf(#[from] gimli::Error),
}

#[derive(Debug, Clone)]
struct ImageSymbol
{
    address: u64,
    size: u64,
    name: String,
}

/// Parsed symbol table and line tables of one executable.
pub struct ProcessImage
{
    path: PathBuf,
    bias: u64,
    file_range: (u64, u64),
    symbols: Vec<ImageSymbol>,
    // addr2line parses units lazily; lookups go through one guard.
    context: Option<Mutex<Context<OwnedReader>>>,
}

impl std::fmt::Debug for ProcessImage
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("ProcessImage")
            .field("path", &self.path)
            .field("bias", &format_args!("{:#x}", self.bias))
            .field("symbols", &self.symbols.len())
            .field("debug_info", &self.context.is_some())
            .finish_non_exhaustive()
    }
}

impl ProcessImage
{
    /// Parse the running executable. `reference` is the runtime address of
    /// [`REFERENCE_SYMBOL`].
    ///
    /// ## Errors
    ///
    /// Any [`ImageError`].
    pub fn from_current_exe(reference: usize) -> Result<Self, ImageError>
    {
        let path = env::current_exe()?;
        let bytes = fs::read(&path)?;
        let file = object::File::parse(&*bytes)?;

        let symbols = text_symbols(&file);
        let reference_address = symbols
            .iter()
            .find(|symbol| demangled_eq(&symbol.name, REFERENCE_SYMBOL))
            .map(|symbol| symbol.address)
            .ok_or(ImageError::MissingReference(REFERENCE_SYMBOL))?;
        let bias = (reference as u64).wrapping_sub(reference_address);

        let mut file_range = (u64::MAX, 0);
        for segment in file.segments() {
            file_range.0 = file_range.0.min(segment.address());
            file_range.1 = file_range.1.max(segment.address().saturating_add(segment.size()));
        }

        let context = if file.section_by_name(".debug_info").is_some() || file.section_by_name("__debug_info").is_some() {
            let endian = if file.is_little_endian() {
                RunTimeEndian::Little
            } else {
                RunTimeEndian::Big
            };
            let dwarf = Dwarf::load(|id| Ok::<_, gimli::Error>(section_reader(&file, id, endian)))?;
            Some(Mutex::new(Context::from_dwarf(dwarf)?))
        } else {
            None
        };

        Ok(Self {
            path,
            bias,
            file_range,
            symbols,
            context,
        })
    }

    /// Address in the executable file for a runtime address, if it falls
    /// inside this image.
    pub fn file_address(&self, runtime: usize) -> Option<u64>
    {
        let address = (runtime as u64).wrapping_sub(self.bias);
        (address >= self.file_range.0 && address < self.file_range.1).then_some(address)
    }

    /// Runtime start address of the function containing the call before
    /// return address `ip`.
    pub fn function_start(&self, ip: usize) -> Option<usize>
    {
        let target = self.file_address(ip)?.checked_sub(1)?;
        let symbol = self.symbol_containing(target)?;
        usize::try_from(symbol.address.wrapping_add(self.bias)).ok()
    }

    /// Function, file and line of the call before return address `ip`.
    ///
    /// `None` if `ip` lies outside this image. The innermost function wins for
    /// inlined call sites.
    pub fn symbolicate(&self, ip: usize) -> Option<SymbolRecord>
    {
        let target = self.file_address(ip)?.checked_sub(1)?;
        let mut record = SymbolRecord::default();

        if let Some(context) = &self.context {
            let context = context.lock().unwrap_or_else(PoisonError::into_inner);
            if let Ok(mut frames) = context.find_frames(target).skip_all_loads() {
                if let Ok(Some(frame)) = frames.next() {
                    record.name = frame
                        .function
                        .as_ref()
                        .and_then(|function| function.raw_name().ok())
                        .map(|name| name.into_owned());
                    if let Some(location) = frame.location {
                        record.file = location.file.map(PathBuf::from);
                        record.line = location.line;
                    }
                }
            };
        }

        if record.name.is_none() {
            record.name = self.symbol_containing(target).map(|symbol| symbol.name.clone());
        }
        Some(record)
    }

    fn symbol_containing(&self, address: u64) -> Option<&ImageSymbol>
    {
        let index = self.symbols.partition_point(|symbol| symbol.address <= address);
        let symbol = self.symbols.get(index.checked_sub(1)?)?;
        // Mach-O symbols carry no size; the next symbol bounds them.
        (symbol.size == 0 || address < symbol.address.saturating_add(symbol.size)).then_some(symbol)
    }
}

fn text_symbols(file: &object::File<'_>) -> Vec<ImageSymbol>
{
    let mut symbols = collect_text(file.symbols());
    if symbols.is_empty() {
        symbols = collect_text(file.dynamic_symbols());
    }
    symbols.sort_by_key(|symbol| symbol.address);
    symbols.dedup_by_key(|symbol| symbol.address);
    symbols
}

fn collect_text<'data: 'file, 'file>(symbols: impl Iterator<Item = object::Symbol<'data, 'file>>) -> Vec<ImageSymbol>
{
    symbols
        .filter(|symbol| symbol.kind() == SymbolKind::Text && symbol.is_definition())
        .filter_map(|symbol| {
            Some(ImageSymbol {
                address: symbol.address(),
                size: symbol.size(),
                name: symbol.name().ok()?.to_string(),
            })
        })
        .collect()
}

fn demangled_eq(raw: &str, path: &str) -> bool
{
    try_demangle(raw).is_ok_and(|demangled| format!("{demangled:#}") == path)
}

fn section_reader(file: &object::File<'_>, id: SectionId, endian: RunTimeEndian) -> OwnedReader
{
    let name = id.name();
    let macho_name = name.strip_prefix('.').map(|rest| format!("__{rest}"));
    let section = file
        .section_by_name(name)
        .or_else(|| macho_name.as_deref().and_then(|alias| file.section_by_name(alias)));

    let data: Arc<[u8]> = match section.and_then(|section| section.uncompressed_data().ok()) {
        Some(bytes) => Arc::from(&*bytes),
        None => Arc::from(Vec::new()),
    };
    EndianArcSlice::new(data, endian)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[inline(never)]
    fn marker() -> u32
    {
        std::hint::black_box(7)
    }

    #[test]
    fn demangled_match_ignores_hash()
    {
        assert!(demangled_eq("_ZN13callerid_core6marker17h0123456789abcdefE", "callerid_core::marker"));
        assert!(!demangled_eq("_ZN13callerid_core6marker17h0123456789abcdefE", "callerid_core"));
        assert!(!demangled_eq("memcpy", "memcpy"));
    }

    #[test]
    fn symbol_lookup_respects_sizes()
    {
        let image = ProcessImage {
            path: PathBuf::new(),
            bias: 0x1000,
            file_range: (0x100, 0x900),
            symbols: vec![
                ImageSymbol { address: 0x100, size: 0x40, name: "a".into() },
                ImageSymbol { address: 0x200, size: 0, name: "b".into() },
            ],
            context: None,
        };

        assert_eq!(image.file_address(0x1120), Some(0x120));
        assert_eq!(image.file_address(0x50), None);
        assert_eq!(image.symbolicate(0x1110).and_then(|r| r.name).as_deref(), Some("a"));
        assert_eq!(image.symbolicate(0x1160).and_then(|r| r.name), None);
        assert_eq!(image.symbolicate(0x1280).and_then(|r| r.name).as_deref(), Some("b"));
        assert_eq!(image.function_start(0x1110), Some(0x1100));
        assert!(image.symbolicate(0x5000).is_none());
    }

    #[test]
    fn own_executable_symbolicates_a_function()
    {
        // Absent only for stripped test binaries.
        let Some(image) = process_image() else {
            return;
        };
        let start = marker as fn() -> u32 as usize;

        let record = image.symbolicate(start + 1).unwrap();
        let name = crate::symbols::function_name(record.name.as_deref().unwrap_or_default());
        assert!(name.ends_with("marker"), "{name}");
        assert_eq!(image.function_start(start + 1), Some(start));
    }
}
