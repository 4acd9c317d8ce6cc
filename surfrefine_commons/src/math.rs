// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ops::{Add, Mul, Sub};

use float_ord::FloatOrd;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct DVec3Ord([FloatOrd<f64>; 3]);

pub trait ToOrd<T>
where
    T: Eq + PartialEq + Ord + PartialOrd + std::hash::Hash + Copy,
{
    fn to_ord(&self) -> T;
}

impl ToOrd<DVec3Ord> for glam::DVec3 {
    fn to_ord(&self) -> DVec3Ord {
        DVec3Ord([FloatOrd(self.x), FloatOrd(self.y), FloatOrd(self.z)])
    }
}

pub trait ToVec<T> {
    fn to_vec(&self) -> T;
}

impl ToVec<glam::DVec3> for DVec3Ord {
    fn to_vec(&self) -> glam::DVec3 {
        glam::DVec3::new(self.0[0].0, self.0[1].0, self.0[2].0)
    }
}

pub fn lerp<T>(start: T, end: T, t: f64) -> T
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<f64, Output = T>,
{
    start + (end - start) * t
}

#[test]
pub fn test() {
    let v = glam::DVec3::new(0.25, -1.5, 3.0);
    assert_eq!(v.to_ord().to_vec(), v);

    let a = glam::DVec3::ZERO;
    let b = glam::DVec3::new(2.0, 4.0, -6.0);
    assert_eq!(lerp(a, b, 0.5), glam::DVec3::new(1.0, 2.0, -3.0));
    assert_eq!(lerp(0.0f64, 10.0, 0.25), 2.5);
}
