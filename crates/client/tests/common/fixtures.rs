use bytes::Bytes;
use mapas_client::{EntryId, QueueHandle};

/// Smallest byte string a PDF reader accepts as a header.
pub fn pdf_bytes() -> Bytes {
    Bytes::from_static(b"%PDF-1.7\n%%EOF\n")
}

/// Queue `count` files named `talhao_{n}.pdf` on one farm.
pub fn queue_files(queue: &QueueHandle, count: usize) -> Vec<EntryId> {
    (1..=count)
        .map(|n| queue.add_file(&format!("talhao_{n}.pdf"), "Santa Rita", pdf_bytes()))
        .collect()
}
