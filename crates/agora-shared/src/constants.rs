/// Application name
pub const APP_NAME: &str = "Agora";

/// Maximum post length in characters (after trimming)
pub const MAX_POST_CHARS: usize = 1000;

/// Maximum number of attachments per post
pub const MAX_ATTACHMENTS: usize = 4;

/// Maximum attachment size in bytes (10 MiB)
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

/// Media types accepted for attachments
pub const ALLOWED_MEDIA_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "video/mp4",
    "video/webm",
];

/// JPEG file signature (SOI marker)
pub const JPEG_SIGNATURE: [u8; 2] = [0xFF, 0xD8];

/// Default HTTP/WebSocket port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default public base URL used to build attachment links
pub const DEFAULT_PUBLIC_DOMAIN: &str = "http://localhost:8080";

/// Default page size for feed and message history queries
pub const DEFAULT_PAGE_SIZE: u32 = 50;
