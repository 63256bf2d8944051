//! `rohcpress`: a RObust Header Compression (ROHC) compressor core in Rust.
//!
//! Implements the compression side of RFC 3095 and its companions: IP-only
//! (RFC 3843), UDP, ESP, RTP (RFC 3095), and UDP-Lite (RFC 4019), plus the
//! Uncompressed passthrough profile. The crate consumes raw IP packets and
//! emits ROHC packets; it performs no I/O and leaves the transport, the
//! decompressor, and the user-facing plumbing to its embedder.
//!
//! ## Core concepts
//!
//! - **[`RohcCompressor`]**: one compression channel. Configure the CID
//!   space, enable profiles, then feed packets through
//!   [`RohcCompressor::compress`].
//! - **Profiles**: per-protocol strategies selected in priority order; the
//!   first enabled profile accepting a packet wins.
//! - **Contexts**: per-flow state (CID-indexed, LRU-recycled) driving the
//!   IR → FO → SO state machine of RFC 3095.
//! - **Feedback & segmentation**: feedback from the remote decompressor is
//!   piggybacked onto outgoing packets with two-phase commit; packets too
//!   large for the caller's buffer are split into MRRU-bounded segments.
//!
//! ## Quick start
//!
//! ```rust
//! use rohcpress::{CidType, CompressOutcome, ContextId, RohcCompressor, RohcProfile};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut compressor = RohcCompressor::new(CidType::Small, ContextId::new(15))?;
//!     compressor.enable_profiles(&[RohcProfile::Ip, RohcProfile::Uncompressed])?;
//!
//!     // A minimal IPv4/ICMP packet.
//!     let mut packet = vec![0u8; 84];
//!     packet[0] = 0x45;
//!     packet[2..4].copy_from_slice(&84u16.to_be_bytes());
//!     packet[8] = 64; // TTL
//!     packet[9] = 1; // ICMP
//!     packet[12..16].copy_from_slice(&[192, 0, 2, 1]);
//!     packet[16..20].copy_from_slice(&[192, 0, 2, 2]);
//!
//!     let mut rohc = [0u8; 1500];
//!     match compressor.compress(None, &packet, &mut rohc)? {
//!         CompressOutcome::Packet(len) => println!("ROHC packet: {} bytes", len),
//!         CompressOutcome::NeedsSegmentation => unreachable!("buffer is large enough"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod constants;
pub mod context;
pub mod crc;
pub mod encodings;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod headers;
pub mod profiles;
pub mod sdvl;
pub mod segment;
pub mod types;

pub use context::{ContextState, RohcMode};
pub use engine::{CompressOutcome, GeneralInfo, LastPacketInfo, RohcCompressor, SegmentOutput};
pub use error::{CompressionError, RohcBuildingError, RohcError, RohcParsingError};
pub use profiles::{PacketType, RohcProfile};
pub use types::{CidType, ContextId, SequenceNumber};
