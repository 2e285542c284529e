pub mod domain;
pub mod feed;
pub mod filter;
pub mod gateway;
pub mod memory;
pub mod ports;
pub mod reconcile;
pub mod scroll;
pub mod session;
pub mod view;

#[cfg(test)]
mod test_support;

pub use domain::{
    Card, CardDraft, CardPage, CardPatch, CardQuery, Pagination, SortKey, SortOrder, Tag,
    TagDraft, TagPatch,
};
pub use feed::{CardFeed, FeedSettings, FetchMode, FetchTicket, LoadingFlags};
pub use filter::{FilterState, SearchDebouncer};
pub use gateway::{Envelope, Gateway, GatewayError, GatewayResult, SavedCard};
pub use ports::{ArchiveStore, IdentityProvider, PortError, PortResult, SessionDirectory};
pub use reconcile::CardEvent;
pub use scroll::{ScrollLoader, ScrollMetrics, ScrollSettings};
pub use session::{AppSession, SessionContext};
pub use view::{CardListView, ViewSettings};
