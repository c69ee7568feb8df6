use crate::domain::{
    AppState, repository::LibraryItemRepository, service::LibraryItemService,
};

pub mod http;
pub mod persistence;
pub mod settings;

#[derive(Clone)]
pub struct AppStateImpl<R: LibraryItemRepository> {
    service: LibraryItemService<R>,
}

impl<R: LibraryItemRepository> AppStateImpl<R> {
    pub fn new(service: LibraryItemService<R>) -> Self {
        Self { service }
    }
}

impl<R: LibraryItemRepository> AppState for AppStateImpl<R> {
    type R = R;

    fn service(&self) -> &LibraryItemService<Self::R> {
        &self.service
    }
}
