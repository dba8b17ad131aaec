// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use evc_core::CpId;

#[tokio::test]
async fn publish_never_blocks_even_past_capacity() {
    // No drain consumer keeps up with this burst; publish must stay
    // non-blocking and simply drop the overflow.
    let publisher = AuditPublisher::spawn(None);
    for _ in 0..10_000 {
        publisher.publish(AuditEvent::CpFault { cp_id: CpId::new("CP-001") });
    }
}
