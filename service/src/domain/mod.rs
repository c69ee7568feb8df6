use crate::domain::{repository::LibraryItemRepository, service::LibraryItemService};

pub mod repository;
pub mod service;

/// The global application state shared between all request handlers.
pub trait AppState: Clone + Send + Sync + 'static {
    type R: LibraryItemRepository;
    fn service(&self) -> &LibraryItemService<Self::R>;
}
