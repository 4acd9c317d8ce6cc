// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

macro_rules! define_index_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl $name {
            pub fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_index_type!(PointId);
define_index_type!(EdgeId);
define_index_type!(FaceId);

impl PointId {
    /// The associativity registry indexes points 1-based. Every index that
    /// crosses that boundary goes through here.
    pub fn one_based(self) -> i64 {
        self.0 as i64 + 1
    }
}
