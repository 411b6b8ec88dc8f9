//! Command-line interface
//!
//! Every command loads the image into a RAM flash device, builds the storage
//! stack selected with `--layout` on top of it and runs through that stack.
//! Commands that change the image save it back afterwards.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use flashee::domain::DEFAULT_SEED;
use flashee::infrastructure::devices::{
    MAX_MAPPED_PAGES, create_address_erase_with, create_wear_level_erase_with,
};
use flashee::{
    FlashDevice, LogicalPageMapper, PageRng, PageSpanFlashDevice, RamFlash, WearLevelConfig,
    create_single_page_erase, create_user_flash_region,
};

use crate::image;
use crate::value_parser::{ByteRange, DataSpec, parse_number, parse_range};

/// Inspect and modify flash images through flashee storage stacks
#[derive(Parser, Debug)]
#[command(name = "flashee", version, about, long_about = None)]
pub struct Cli {
    /// Physical page (erase unit) size of the image in bytes
    #[arg(long, global = true, default_value = "4096", value_parser = parse_number)]
    pub page_size: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an erased image
    Create {
        /// Image file to create
        image: PathBuf,
        /// Number of physical pages
        #[arg(long, value_parser = parse_number)]
        pages: u32,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Show the geometry of the image and of the selected layout
    Info {
        /// Image file
        image: PathBuf,
        #[command(flatten)]
        layout: LayoutArgs,
    },
    /// Write data at an address of the selected layout
    Write {
        /// Image file
        image: PathBuf,
        /// Address to write to
        #[arg(value_parser = parse_number)]
        address: u32,
        /// Hex bytes, 'text:...' or '@file'
        data: String,
        #[command(flatten)]
        layout: LayoutArgs,
    },
    /// Read data from an address of the selected layout
    Read {
        /// Image file
        image: PathBuf,
        /// Address to read from
        #[arg(value_parser = parse_number)]
        address: u32,
        /// Number of bytes to read
        #[arg(value_parser = parse_number)]
        length: u32,
        /// Print the data as text instead of a hex dump
        #[arg(long)]
        text: bool,
        /// Save the data to a host file
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[command(flatten)]
        layout: LayoutArgs,
    },
    /// Erase pages of the selected layout
    Erase {
        /// Image file
        image: PathBuf,
        /// Page index to erase
        #[arg(value_parser = parse_number, required_unless_present = "all")]
        page: Option<u32>,
        /// Erase every page
        #[arg(long, conflicts_with = "page")]
        all: bool,
        #[command(flatten)]
        layout: LayoutArgs,
    },
    /// Dump the page headers and logical map of a wear-leveled layout
    Inspect {
        /// Image file
        image: PathBuf,
        #[command(flatten)]
        layout: LayoutArgs,
    },
}

/// Storage stack built on top of the image
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// The image itself, byte addressable
    Raw,
    /// A page-aligned range of the image
    Region,
    /// Page rewrites through a swap page
    SinglePage,
    /// Page rewrites spread over free pages
    WearLevel,
    /// Byte rewrites in redundant slots over a wear-leveled range
    AddressErase,
}

#[derive(Args, Debug, Clone)]
pub struct LayoutArgs {
    /// Storage stack to access the image through
    #[arg(long, value_enum, default_value_t = Layout::Raw)]
    pub layout: Layout,

    /// Byte range of the image used by the layout (e.g., "64k..1m")
    #[arg(long, value_parser = parse_range)]
    pub range: Option<ByteRange>,

    /// Physical pages kept free by the wear-leveled layouts
    #[arg(long, default_value_t = 2)]
    pub free_pages: u32,

    /// Seed of the free page search
    #[arg(long, value_parser = parse_number)]
    pub seed: Option<u32>,
}

impl LayoutArgs {
    fn start(&self) -> u32 {
        self.range.and_then(|r| r.start).unwrap_or(0)
    }

    fn end(&self, flash: &RamFlash) -> u32 {
        self.range.and_then(|r| r.end).unwrap_or(flash.length())
    }

    /// Range defaults to at most [`MAX_MAPPED_PAGES`] pages from the start.
    fn wear_config(&self, flash: &RamFlash) -> WearLevelConfig {
        let start = self.start();
        let end = self.range.and_then(|r| r.end).unwrap_or_else(|| {
            start
                .saturating_add(MAX_MAPPED_PAGES * flash.page_size())
                .min(flash.length())
        });
        WearLevelConfig::new(start, end)
            .with_free_pages(self.free_pages)
            .with_seed(self.seed.unwrap_or(DEFAULT_SEED))
    }
}

/// Build the selected stack over `flash` and hand it to `f`.
fn with_device<T>(
    flash: &mut RamFlash,
    args: &LayoutArgs,
    f: impl FnOnce(&mut dyn FlashDevice) -> Result<T>,
) -> Result<T> {
    let (start, end) = (args.start(), args.end(flash));
    log::debug!("opening {:?} layout", args.layout);
    match args.layout {
        Layout::Raw => {
            if args.range.is_some() {
                log::warn!("--range is ignored by the raw layout");
            }
            f(&mut PageSpanFlashDevice::new(flash))
        }
        Layout::Region => {
            let region = create_user_flash_region(flash, start, end, 1)
                .with_context(|| format!("Invalid region {:#x}..{:#x}", start, end))?;
            f(&mut PageSpanFlashDevice::new(region))
        }
        Layout::SinglePage => {
            let mut device = create_single_page_erase(flash, start, end)
                .context("Failed to build single-page layout")?;
            f(&mut device)
        }
        Layout::WearLevel => {
            let config = args.wear_config(flash);
            let mut device = create_wear_level_erase_with(flash, &config)
                .context("Failed to build wear-level layout")?;
            f(&mut device)
        }
        Layout::AddressErase => {
            let config = args.wear_config(flash);
            let mut device = create_address_erase_with(flash, &config)
                .context("Failed to build address-erase layout")?;
            f(&mut device)
        }
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let page_size = cli.page_size;
    match cli.command {
        Command::Create { image, pages, force } => {
            image::create(&image, page_size, pages, force)?;
            println!("Created {} ({} pages of {} bytes)", image.display(), pages, page_size);
        }
        Command::Info { image, layout } => {
            let mut flash = image::load(&image, page_size)?;
            println!("Image:        {}", image.display());
            println!("Size:         {} bytes", flash.length());
            println!("Pages:        {} x {} bytes", flash.page_count(), flash.page_size());
            with_device(&mut flash, &layout, |device| {
                println!("Layout:       {:?}", layout.layout);
                println!("Page size:    {} bytes", device.page_size());
                println!("Page count:   {}", device.page_count());
                println!("Capacity:     {} bytes", device.length());
                Ok(())
            })?;
        }
        Command::Write {
            image,
            address,
            data,
            layout,
        } => {
            let bytes = DataSpec::parse(&data)?.into_bytes()?;
            let mut flash = image::load(&image, page_size)?;
            with_device(&mut flash, &layout, |device| {
                device
                    .write(address, &bytes)
                    .with_context(|| format!("Failed to write {} bytes at {:#x}", bytes.len(), address))
            })?;
            image::save(&image, &flash)?;
            log::info!("wrote {} bytes at {:#x}", bytes.len(), address);
        }
        Command::Read {
            image,
            address,
            length,
            text,
            output,
            layout,
        } => {
            let mut flash = image::load(&image, page_size)?;
            let data = read_bytes(&mut flash, &layout, address, length)?;
            if let Some(path) = output {
                std::fs::write(&path, &data)
                    .with_context(|| format!("Failed to write output file: {}", path.display()))?;
            } else if text {
                println!("{}", String::from_utf8_lossy(&data));
            } else {
                print!("{}", hex_dump(address, &data));
            }
        }
        Command::Erase {
            image,
            page,
            all,
            layout,
        } => {
            let mut flash = image::load(&image, page_size)?;
            with_device(&mut flash, &layout, |device| {
                if all {
                    return device.erase_all().context("Failed to erase device");
                }
                let page = page.context("No page given")?;
                if page >= device.page_count() {
                    anyhow::bail!("Page {} is out of range (0..{})", page, device.page_count());
                }
                device
                    .erase_page(device.page_address(page))
                    .with_context(|| format!("Failed to erase page {}", page))
            })?;
            image::save(&image, &flash)?;
        }
        Command::Inspect { image, layout } => {
            let mut flash = image::load(&image, page_size)?;
            let config = layout.wear_config(&flash);
            let report = match layout.layout {
                Layout::WearLevel => {
                    let mut device = create_wear_level_erase_with(&mut flash, &config)?;
                    describe_mapper(device.inner_mut())?
                }
                Layout::AddressErase => {
                    let mut device = create_address_erase_with(&mut flash, &config)?;
                    describe_mapper(device.inner_mut().inner_mut())?
                }
                other => anyhow::bail!(
                    "Layout {:?} has no page map. Use --layout wear-level or address-erase.",
                    other
                ),
            };
            print!("{}", report);
        }
    }
    Ok(())
}

fn read_bytes(flash: &mut RamFlash, layout: &LayoutArgs, address: u32, length: u32) -> Result<Vec<u8>> {
    with_device(flash, layout, |device| {
        let mut data = vec![0u8; length as usize];
        device
            .read(address, &mut data)
            .with_context(|| format!("Failed to read {} bytes at {:#x}", length, address))?;
        Ok(data)
    })
}

fn describe_mapper<D: FlashDevice, R: PageRng>(mapper: &mut LogicalPageMapper<D, R>) -> Result<String> {
    use std::fmt::Write;

    let headers = mapper.headers().context("Failed to read page headers")?;
    let mut out = String::new();
    writeln!(out, "physical  header  state")?;
    for (page, header) in headers.iter().enumerate() {
        writeln!(out, "{:>8}  {:#06x}  {}", page, header.raw(), header)?;
    }
    writeln!(out)?;
    writeln!(out, "logical   physical")?;
    for logical in 0..mapper.page_count() {
        match mapper.physical_page_for(logical) {
            Some(page) => writeln!(out, "{:>7}   {}", logical, page)?,
            None => writeln!(out, "{:>7}   -", logical)?,
        }
    }
    writeln!(out)?;
    writeln!(out, "free physical pages: {}", mapper.free_page_count())?;
    Ok(out)
}

/// Classic offset / hex / ASCII dump, 16 bytes per line.
fn hex_dump(base: u32, data: &[u8]) -> String {
    let mut out = String::new();
    for (i, line) in data.chunks(16).enumerate() {
        let hex: Vec<String> = line.iter().map(|b| format!("{:02x}", b)).collect();
        let ascii: String = line
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        out.push_str(&format!(
            "{:08x}  {:<47}  |{}|\n",
            base as usize + i * 16,
            hex.join(" "),
            ascii
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(args: &[&str]) -> Result<()> {
        let cli = Cli::try_parse_from(std::iter::once("flashee").chain(args.iter().copied()))?;
        run(cli)
    }

    fn layout(layout: Layout) -> LayoutArgs {
        LayoutArgs {
            layout,
            range: None,
            free_pages: 2,
            seed: None,
        }
    }

    #[test]
    fn test_write_then_read_through_layouts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flash.img");
        let image = path.to_str().unwrap();

        run_args(&["create", image, "--pages", "16", "--page-size", "256"]).unwrap();
        run_args(&["write", image, "0x10", "text:hello", "--layout", "wear-level", "--page-size", "256"])
            .unwrap();
        run_args(&["write", image, "0x10", "text:HELLO", "--layout", "wear-level", "--page-size", "256"])
            .unwrap();
        run_args(&["write", image, "300", "00 01 02", "--page-size", "256"]).unwrap();

        let mut flash = image::load(&path, 256).unwrap();
        let data = read_bytes(&mut flash, &layout(Layout::WearLevel), 0x10, 5).unwrap();
        assert_eq!(data, b"HELLO");
        let data = read_bytes(&mut flash, &layout(Layout::Raw), 300, 3).unwrap();
        assert_eq!(data, [0, 1, 2]);
    }

    #[test]
    fn test_erase_and_inspect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flash.img");
        let image = path.to_str().unwrap();

        run_args(&["create", image, "--pages", "8", "--page-size", "128"]).unwrap();
        run_args(&["write", image, "0", "ff00", "--layout", "address-erase", "--page-size", "128"])
            .unwrap();
        run_args(&["inspect", image, "--layout", "address-erase", "--page-size", "128"]).unwrap();
        assert!(run_args(&["inspect", image, "--page-size", "128"]).is_err());

        run_args(&["erase", image, "0", "--layout", "address-erase", "--page-size", "128"]).unwrap();
        let mut flash = image::load(&path, 128).unwrap();
        let data = read_bytes(&mut flash, &layout(Layout::AddressErase), 0, 2).unwrap();
        assert_eq!(data, [0xFF, 0xFF]);
        assert!(run_args(&["erase", image, "--page-size", "128"]).is_err());
    }

    #[test]
    fn test_region_layout_bounds() {
        let mut flash = RamFlash::new(8, 64);
        let mut args = layout(Layout::Region);
        args.range = Some(parse_range("128..256").unwrap());
        with_device(&mut flash, &args, |device| {
            assert_eq!(device.length(), 128);
            device.write(0, &[0x42]).map_err(Into::into)
        })
        .unwrap();
        assert_eq!(flash.as_bytes()[128], 0x42);

        args.range = Some(parse_range("100..256").unwrap());
        assert!(with_device(&mut flash, &args, |_| Ok(())).is_err());
    }

    #[test]
    fn test_describe_mapper() {
        let mut flash = RamFlash::new(6, 64);
        let config = layout(Layout::WearLevel).wear_config(&flash);
        let mut device = create_wear_level_erase_with(&mut flash, &config).unwrap();
        device.write(70, &[1, 2, 3]).unwrap();
        let report = describe_mapper(device.inner_mut()).unwrap();
        assert!(report.contains("in-use(1)"));
        assert!(report.contains("signature"));
        assert!(report.contains("free physical pages: 4"));
    }

    #[test]
    fn test_hex_dump() {
        let dump = hex_dump(0x20, b"flash\x00\xff");
        assert_eq!(
            dump,
            format!("{:08x}  {:<47}  |flash..|\n", 0x20, "66 6c 61 73 68 00 ff")
        );
    }
}
