// Copyright 2024 The compcache authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// Create a `Vec<String>` from string literals.
macro_rules! stringvec {
    ( $( $x:expr ),* $(,)? ) => {
        vec![ $( $x.to_owned(), )* ]
    };
}

/// Create an `ArgList` from string literals.
macro_rules! arglist {
    ( $( $x:expr ),* $(,)? ) => {
        $crate::arglist::ArgList::from(stringvec![ $( $x ),* ])
    };
}

pub mod utils;
