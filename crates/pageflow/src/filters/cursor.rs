// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use super::{Filter, FilterSet};

/// Filter selected by a [`FilterCursor`], by index into the [`FilterSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorItem {
    /// Run the synchronous variant of the filter at this index.
    Sync(usize),
    /// Run the asynchronous variant of the filter at this index.
    Async(usize),
}

/// One-way cursor over a [`FilterSet`].
///
/// Each stage resets the cursor and scans the whole set once, yielding only
/// the filters that implement that stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterCursor {
    index: usize,
}

impl FilterCursor {
    /// Creates a cursor at the start of the set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves back to the start of the set.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Position of the next filter to inspect.
    pub fn position(&self) -> usize {
        self.index
    }

    /// Advances to the next authorization filter.
    pub fn next_authorization(&mut self, filters: &FilterSet) -> Option<CursorItem> {
        self.next_matching(
            filters,
            |f| f.as_authorization().is_some(),
            |f| f.as_async_authorization().is_some(),
        )
    }

    /// Advances to the next resource filter.
    pub fn next_resource(&mut self, filters: &FilterSet) -> Option<CursorItem> {
        self.next_matching(
            filters,
            |f| f.as_resource().is_some(),
            |f| f.as_async_resource().is_some(),
        )
    }

    fn next_matching(
        &mut self,
        filters: &FilterSet,
        is_sync: impl Fn(&dyn Filter) -> bool,
        is_async: impl Fn(&dyn Filter) -> bool,
    ) -> Option<CursorItem> {
        while let Some(filter) = filters.get(self.index) {
            let index = self.index;
            self.index += 1;

            if is_async(filter.as_ref()) {
                return Some(CursorItem::Async(index));
            }
            if is_sync(filter.as_ref()) {
                return Some(CursorItem::Sync(index));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{
        AsyncResourceFilter, AuthorizationFilter, AuthorizationFilterContext,
        ResourceExecutedContext,
        ResourceExecutingContext, ResourceFilter,
    };
    use crate::invoker::ResourceNext;
    use crate::Result;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Auth;
    impl Filter for Auth {
        fn as_authorization(&self) -> Option<&dyn AuthorizationFilter> {
            Some(self)
        }
    }
    impl AuthorizationFilter for Auth {
        fn on_authorization(&self, _: &mut AuthorizationFilterContext) -> Result<()> {
            Ok(())
        }
    }

    struct Both;
    impl Filter for Both {
        fn as_resource(&self) -> Option<&dyn ResourceFilter> {
            Some(self)
        }
        fn as_async_resource(&self) -> Option<&dyn AsyncResourceFilter> {
            Some(self)
        }
    }
    impl ResourceFilter for Both {
        fn on_resource_executing(&self, _: &mut ResourceExecutingContext) -> Result<()> {
            Ok(())
        }
        fn on_resource_executed(&self, _: &mut ResourceExecutedContext) -> Result<()> {
            Ok(())
        }
    }
    #[async_trait]
    impl AsyncResourceFilter for Both {
        async fn on_resource_execution(
            &self,
            ctx: &mut ResourceExecutingContext,
            next: ResourceNext<'_>,
        ) -> Result<()> {
            next.run(ctx).await.map(|_| ())
        }
    }

    fn set() -> FilterSet {
        FilterSet::new(vec![Arc::new(Auth), Arc::new(Both), Arc::new(Auth)])
    }

    #[test]
    fn test_authorization_scan() {
        let filters = set();
        let mut cursor = FilterCursor::new();
        assert_eq!(cursor.next_authorization(&filters), Some(CursorItem::Sync(0)));
        assert_eq!(cursor.next_authorization(&filters), Some(CursorItem::Sync(2)));
        assert_eq!(cursor.next_authorization(&filters), None);
        assert_eq!(cursor.position(), 3);
    }

    #[test]
    fn test_reset_and_async_preferred() {
        let filters = set();
        let mut cursor = FilterCursor::new();
        while cursor.next_authorization(&filters).is_some() {}

        cursor.reset();
        assert_eq!(cursor.next_resource(&filters), Some(CursorItem::Async(1)));
        assert_eq!(cursor.next_resource(&filters), None);
    }
}
