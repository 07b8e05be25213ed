#![forbid(unsafe_code)]

//! Page cursor and trigger debouncing for loading older history.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Paginator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
	Idle,
	Loading,
	/// Server returned an empty page; no more fetches.
	Exhausted,
}

/// Scroll position of the inverted message list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
	pub content_height: f64,
	pub viewport_height: f64,
	pub offset_y: f64,
}

impl ScrollMetrics {
	/// True when the viewport is within `threshold` pixels of the oldest loaded message.
	pub fn is_near_oldest_edge(&self, threshold: f64) -> bool {
		self.content_height - self.viewport_height - threshold <= self.offset_y
	}
}

/// A fetch the caller must perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
	pub page: u32,
}

#[derive(Debug)]
pub struct Paginator {
	cursor: u32,
	state: PageState,
	closed: bool,
	debounce: Duration,
	near_edge_threshold: f64,
	deadline: Option<Instant>,
}

impl Paginator {
	pub fn new(debounce: Duration, near_edge_threshold: f64) -> Self {
		Self {
			cursor: 1,
			state: PageState::Idle,
			closed: false,
			debounce,
			near_edge_threshold,
			deadline: None,
		}
	}

	/// Next page to request (starts at 1).
	pub fn cursor(&self) -> u32 {
		self.cursor
	}

	pub fn state(&self) -> PageState {
		self.state
	}

	pub fn is_closed(&self) -> bool {
		self.closed
	}

	/// Pending debounce deadline, if a trigger is armed.
	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Scroll trigger. Returns true when it armed the debounce.
	pub fn on_scroll(&mut self, metrics: ScrollMetrics, now: Instant) -> bool {
		if !metrics.is_near_oldest_edge(self.near_edge_threshold) {
			return false;
		}
		self.arm(now)
	}

	/// End-of-list trigger. Always qualifies.
	pub fn on_end_reached(&mut self, now: Instant) -> bool {
		self.arm(now)
	}

	fn arm(&mut self, now: Instant) -> bool {
		if self.closed || self.state != PageState::Idle {
			return false;
		}
		self.deadline = Some(now + self.debounce);
		true
	}

	/// Issue the debounced fetch once its deadline has passed.
	pub fn poll_due(&mut self, now: Instant) -> Option<PageRequest> {
		let deadline = self.deadline?;
		if now < deadline {
			return None;
		}
		self.deadline = None;
		self.begin()
	}

	/// Fetch the next page immediately, bypassing the debounce.
	pub fn request_next_page(&mut self) -> Option<PageRequest> {
		self.deadline = None;
		self.begin()
	}

	fn begin(&mut self) -> Option<PageRequest> {
		if self.closed || self.state != PageState::Idle {
			return None;
		}
		self.state = PageState::Loading;
		debug!(page = self.cursor, "requesting history page");
		Some(PageRequest { page: self.cursor })
	}

	/// Record the outcome of the in-flight fetch: the number of rows, or an error.
	pub fn complete<E>(&mut self, result: Result<usize, E>) -> PageState {
		if self.closed || self.state != PageState::Loading {
			return self.state;
		}
		self.state = match result {
			Ok(0) => PageState::Exhausted,
			Ok(_) => {
				self.cursor += 1;
				PageState::Idle
			}
			Err(_) => PageState::Idle,
		};
		self.state
	}

	/// Stop honoring triggers and completions.
	pub fn close(&mut self) {
		self.closed = true;
		self.deadline = None;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const DEBOUNCE: Duration = Duration::from_millis(300);

	fn near() -> ScrollMetrics {
		ScrollMetrics {
			content_height: 1000.0,
			viewport_height: 600.0,
			offset_y: 390.0,
		}
	}

	fn far() -> ScrollMetrics {
		ScrollMetrics {
			content_height: 1000.0,
			viewport_height: 600.0,
			offset_y: 100.0,
		}
	}

	fn ms(n: u64) -> Duration {
		Duration::from_millis(n)
	}

	#[test]
	fn near_edge_uses_threshold() {
		assert!(near().is_near_oldest_edge(20.0));
		assert!(!far().is_near_oldest_edge(20.0));
		let exact = ScrollMetrics {
			content_height: 1000.0,
			viewport_height: 600.0,
			offset_y: 380.0,
		};
		assert!(exact.is_near_oldest_edge(20.0));
	}

	#[test]
	fn page_sizes_drive_state_until_exhausted() {
		let mut p = Paginator::new(DEBOUNCE, 20.0);
		let mut seen = vec![p.state()];

		for (expected_page, rows) in [(1, 3usize), (2, 2), (3, 0)] {
			let req = p.request_next_page().expect("fetch issued");
			assert_eq!(req.page, expected_page);
			seen.push(p.state());
			seen.push(p.complete::<()>(Ok(rows)));
		}

		use PageState::*;
		assert_eq!(seen, [Idle, Loading, Idle, Loading, Idle, Loading, Exhausted]);
		assert_eq!(p.cursor(), 3);

		let t0 = Instant::now();
		assert!(!p.on_end_reached(t0));
		assert_eq!(p.poll_due(t0 + ms(1000)), None);
		assert_eq!(p.request_next_page(), None);
	}

	#[test]
	fn triggers_inside_window_coalesce() {
		let mut p = Paginator::new(DEBOUNCE, 20.0);
		let t0 = Instant::now();

		assert!(p.on_scroll(near(), t0));
		assert!(p.on_end_reached(t0 + ms(100)));
		assert_eq!(p.poll_due(t0 + ms(300)), None);

		let req = p.poll_due(t0 + ms(400)).expect("one fetch");
		assert_eq!(req.page, 1);
		assert_eq!(p.poll_due(t0 + ms(800)), None);

		// Suppressed while loading.
		assert!(!p.on_end_reached(t0 + ms(500)));
		assert_eq!(p.deadline(), None);
	}

	#[test]
	fn far_scroll_does_not_trigger() {
		let mut p = Paginator::new(DEBOUNCE, 20.0);
		let t0 = Instant::now();
		assert!(!p.on_scroll(far(), t0));
		assert_eq!(p.poll_due(t0 + ms(1000)), None);
	}

	#[test]
	fn error_returns_to_idle_without_advancing() {
		let mut p = Paginator::new(DEBOUNCE, 20.0);
		p.request_next_page().expect("fetch");
		assert_eq!(p.complete(Err("timeout")), PageState::Idle);
		assert_eq!(p.cursor(), 1);
		assert_eq!(p.request_next_page(), Some(PageRequest { page: 1 }));
	}

	#[test]
	fn stray_completion_is_ignored() {
		let mut p = Paginator::new(DEBOUNCE, 20.0);
		assert_eq!(p.complete::<()>(Ok(5)), PageState::Idle);
		assert_eq!(p.cursor(), 1);
	}

	#[test]
	fn close_stops_everything() {
		let mut p = Paginator::new(DEBOUNCE, 20.0);
		let t0 = Instant::now();
		p.request_next_page().expect("fetch");
		p.close();
		assert_eq!(p.complete::<()>(Ok(4)), PageState::Loading);
		assert_eq!(p.cursor(), 1);
		assert!(!p.on_end_reached(t0));
		assert_eq!(p.request_next_page(), None);
	}
}
