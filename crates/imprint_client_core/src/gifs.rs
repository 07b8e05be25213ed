#![forbid(unsafe_code)]

use imprint_domain::AttachmentKind;

/// A GIF bundled with the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GifAsset {
	pub id: u32,
	pub name: &'static str,
	/// Value sent as `attachmentUrl`.
	pub attachment_url: &'static str,
	/// Display URI for the bundled asset.
	pub asset_uri: &'static str,
}

const GIF_ASSETS: &[GifAsset] = &[
	GifAsset {
		id: 1,
		name: "dino",
		attachment_url: "/GIFs/dino.gif",
		asset_uri: "asset://gifs/dino.gif",
	},
	GifAsset {
		id: 2,
		name: "leaves",
		attachment_url: "/GIFs/leaves.gif",
		asset_uri: "asset://gifs/leaves.gif",
	},
	GifAsset {
		id: 3,
		name: "tiger",
		attachment_url: "/GIFs/tiger.gif",
		asset_uri: "asset://gifs/tiger.gif",
	},
];

/// GIFs offered by the picker, in display order.
pub fn available_gifs() -> &'static [GifAsset] {
	GIF_ASSETS
}

/// Resolve an attachment to a display URI. Unknown types or URLs resolve to `None`.
pub fn resolve_attachment(attachment_type: Option<&str>, attachment_url: Option<&str>) -> Option<String> {
	let kind = attachment_type?.parse::<AttachmentKind>().ok()?;
	let url = attachment_url?.trim();
	match kind {
		AttachmentKind::Gif => GIF_ASSETS
			.iter()
			.find(|gif| gif.attachment_url == url)
			.map(|gif| gif.asset_uri.to_string()),
	}
}
