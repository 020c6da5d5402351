//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

mod conformance;
mod packet;
