// SPDX-License-Identifier: AGPL-3.0
// BTK Print - Drawing surfaces backed by a spool channel
//
// A surface turns page content into a PDF or PostScript document written
// straight into the job's spool file. Page content is passed through as a
// raw content stream; the surface only supplies the document framing.

use crate::print_settings::OutputFormat;
use crate::types::PrintError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Mutex;

/// Document format a surface produces
pub type SurfaceKind = OutputFormat;

struct PageWriter {
    out: BufWriter<File>,
    written: u64,
    /// Byte offsets of objects 1.. (PDF only)
    offsets: Vec<u64>,
    pages: u32,
    finished: bool,
}

impl PageWriter {
    fn emit(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.out.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Start PDF object `id` at the current offset
    fn begin_object(&mut self, id: usize) -> std::io::Result<()> {
        if self.offsets.len() < id {
            self.offsets.resize(id, 0);
        }
        self.offsets[id - 1] = self.written;
        self.emit(format!("{} 0 obj\n", id).as_bytes())
    }
}

/// Paged drawing target writing into a spool channel
pub struct Surface {
    kind: SurfaceKind,
    width: f64,
    height: f64,
    fallback_resolution: f64,
    writer: Mutex<PageWriter>,
}

impl Surface {
    /// Create a surface of `width` x `height` points writing into `out`.
    /// The document header is written immediately.
    pub fn new(kind: SurfaceKind, out: File, width: f64, height: f64) -> Result<Self, PrintError> {
        if !(width > 0.0 && height > 0.0) {
            return Err(PrintError::Surface(format!(
                "invalid page size {}x{}",
                width, height
            )));
        }

        let mut writer = PageWriter {
            out: BufWriter::new(out),
            written: 0,
            offsets: Vec::new(),
            pages: 0,
            finished: false,
        };

        let header = match kind {
            OutputFormat::Pdf => b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n".to_vec(),
            OutputFormat::Ps => format!(
                "%!PS-Adobe-3.0\n%%Creator: btk-print\n%%BoundingBox: 0 0 {} {}\n\
                 %%Pages: (atend)\n%%EndComments\n",
                width.ceil() as i64,
                height.ceil() as i64
            )
            .into_bytes(),
        };
        writer.emit(&header).map_err(surface_io)?;

        tracing::debug!("Created {} surface {}x{}", kind.nick(), width, height);

        Ok(Self {
            kind,
            width,
            height,
            fallback_resolution: 300.0,
            writer: Mutex::new(writer),
        })
    }

    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Resolution (dpi) used when content has to be rasterized
    pub fn fallback_resolution(&self) -> f64 {
        self.fallback_resolution
    }

    pub fn set_fallback_resolution(&mut self, dpi: f64) {
        self.fallback_resolution = dpi;
    }

    pub fn page_count(&self) -> u32 {
        self.writer.lock().unwrap().pages
    }

    pub fn is_finished(&self) -> bool {
        self.writer.lock().unwrap().finished
    }

    /// Emit one page with the given content stream
    pub fn show_page(&self, content: &[u8]) -> Result<(), PrintError> {
        let mut writer = self.writer.lock().unwrap();
        if writer.finished {
            return Err(PrintError::Surface("surface already finished".to_string()));
        }

        let page = writer.pages + 1;
        match self.kind {
            OutputFormat::Pdf => self.write_pdf_page(&mut writer, page, content),
            OutputFormat::Ps => {
                writer
                    .emit(format!("%%Page: {} {}\n", page, page).as_bytes())
                    .and_then(|_| writer.emit(content))
                    .and_then(|_| writer.emit(b"\nshowpage\n"))
            }
        }
        .map_err(surface_io)?;

        writer.pages = page;
        tracing::debug!("Wrote page {} to spool", page);
        Ok(())
    }

    fn write_pdf_page(&self, w: &mut PageWriter, page: u32, content: &[u8]) -> std::io::Result<()> {
        let page_id = 3 + 2 * (page as usize - 1);
        let content_id = page_id + 1;

        w.begin_object(page_id)?;
        w.emit(
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                 /Contents {} 0 R /Resources << >> >>\nendobj\n",
                self.width, self.height, content_id
            )
            .as_bytes(),
        )?;

        w.begin_object(content_id)?;
        w.emit(format!("<< /Length {} >>\nstream\n", content.len()).as_bytes())?;
        w.emit(content)?;
        w.emit(b"\nendstream\nendobj\n")
    }

    /// Write the document trailer and flush. Calling it again is a no-op.
    pub fn finish(&self) -> Result<(), PrintError> {
        let mut writer = self.writer.lock().unwrap();
        if writer.finished {
            return Ok(());
        }

        match self.kind {
            OutputFormat::Pdf => Self::write_pdf_trailer(&mut writer),
            OutputFormat::Ps => {
                let trailer = format!("%%Trailer\n%%Pages: {}\n%%EOF\n", writer.pages);
                writer.emit(trailer.as_bytes())
            }
        }
        .and_then(|_| writer.out.flush())
        .map_err(surface_io)?;

        writer.finished = true;
        tracing::debug!(
            "Finished {} surface: {} pages, {} bytes",
            self.kind.nick(),
            writer.pages,
            writer.written
        );
        Ok(())
    }

    fn write_pdf_trailer(w: &mut PageWriter) -> std::io::Result<()> {
        let kids = (0..w.pages as usize)
            .map(|i| format!("{} 0 R", 3 + 2 * i))
            .collect::<Vec<_>>()
            .join(" ");

        w.begin_object(2)?;
        let pages = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>\nendobj\n",
            kids, w.pages
        );
        w.emit(pages.as_bytes())?;
        w.begin_object(1)?;
        w.emit(b"<< /Type /Catalog /Pages 2 0 R >>\nendobj\n")?;

        let xref_offset = w.written;
        let count = w.offsets.len() + 1;
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", count);
        for offset in &w.offsets {
            xref.push_str(&format!("{:010} 00000 n \n", offset));
        }
        xref.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            count, xref_offset
        ));
        w.emit(xref.as_bytes())
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("kind", &self.kind)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

fn surface_io(e: std::io::Error) -> PrintError {
    PrintError::Surface(format!("Failed to write to spool: {}", e))
}
