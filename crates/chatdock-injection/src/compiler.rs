//! Compiles an action list into one self-contained injected script.
//!
//! The output is an async IIFE that runs inside the surface's page:
//! a polling element finder that can descend through one iframe and one
//! shadow root, one routine per action kind, and a sequencer that
//! aggregates outcomes and ships them out through the navigation
//! side-channel. The script always returns its result through the
//! channel; it never throws outward, because nothing outside the page
//! could catch it.

use tracing::debug;

use crate::action::{
    DEFAULT_EXTRACT_INTERVAL_MS, DEFAULT_EXTRACT_TIMEOUT_MS, DEFAULT_FINDER_TIMEOUT_MS,
    FINDER_POLL_INTERVAL_MS, InjectionAction,
};
use crate::error::InjectionError;
use crate::sidechannel::ChannelConfig;

/// Build the script for one sequence. `correlation_id` ties the
/// side-channel frames this script emits back to the pending request.
pub fn compile_sequence(
    actions: &[InjectionAction],
    correlation_id: &str,
    channel: &ChannelConfig,
) -> Result<String, InjectionError> {
    let actions_literal =
        serde_json::to_string(actions).map_err(|e| InjectionError::Decode(e.to_string()))?;
    let cid_literal = serde_json::to_string(correlation_id)
        .map_err(|e| InjectionError::Decode(e.to_string()))?;
    let base_literal = serde_json::to_string(&channel.base_url())
        .map_err(|e| InjectionError::Decode(e.to_string()))?;

    let mut script = String::new();
    script.push_str("(async () => {\n");
    script.push_str(&format!("  const CID = {cid_literal};\n"));
    script.push_str(&format!("  const CHANNEL_BASE = {base_literal};\n"));
    script.push_str(&format!(
        "  const MAX_CHUNK_LEN = {};\n",
        channel.max_chunk_len
    ));
    script.push_str(&format!("  const actions = {actions_literal};\n\n"));

    script.push_str("  const __cdSleep = (ms) => new Promise((resolve) => setTimeout(resolve, ms));\n\n");

    // Generic retry-until-deadline combinator; the finder and extract
    // steps are both instances of it.
    script.push_str("  const __cdPoll = (probe, intervalMs, timeoutMs, label) => new Promise((resolve, reject) => {\n");
    script.push_str("    const startedAt = Date.now();\n");
    script.push_str("    const attempt = async () => {\n");
    script.push_str("      let value = null;\n");
    script.push_str("      try { value = await probe(); } catch (_) { value = null; }\n");
    script.push_str("      if (value !== null && value !== undefined && value !== '') { resolve(value); return; }\n");
    script.push_str("      if (Date.now() - startedAt >= timeoutMs) { reject(new Error(label)); return; }\n");
    script.push_str("      setTimeout(attempt, intervalMs);\n");
    script.push_str("    };\n");
    script.push_str("    attempt();\n");
    script.push_str("  });\n\n");

    script.push_str("  const __cdFind = (target) => {\n");
    script.push_str(&format!(
        "    const timeoutMs = target.timeout_ms ?? {DEFAULT_FINDER_TIMEOUT_MS};\n"
    ));
    script.push_str("    return __cdPoll(() => {\n");
    script.push_str("      let root = document;\n");
    script.push_str("      if (target.frame_selector) {\n");
    script.push_str("        const frame = document.querySelector(target.frame_selector);\n");
    script.push_str("        if (!frame || !frame.contentDocument) return null;\n");
    script.push_str("        root = frame.contentDocument;\n");
    script.push_str("      }\n");
    script.push_str("      if (target.shadow_host) {\n");
    script.push_str("        const host = root.querySelector(target.shadow_host);\n");
    script.push_str("        if (!host || !host.shadowRoot) return null;\n");
    script.push_str("        root = host.shadowRoot;\n");
    script.push_str("      }\n");
    script.push_str("      return root.querySelector(target.selector);\n");
    script.push_str(&format!(
        "    }}, {FINDER_POLL_INTERVAL_MS}, timeoutMs, `element not found: ${{target.selector}}`);\n"
    ));
    script.push_str("  };\n\n");

    script.push_str("  const __cdVisible = (element) => {\n");
    script.push_str("    const rect = element.getBoundingClientRect();\n");
    script.push_str("    if (rect.width <= 0 || rect.height <= 0) return false;\n");
    script.push_str("    const style = window.getComputedStyle(element);\n");
    script.push_str("    return style.display !== 'none' && style.visibility !== 'hidden' && style.opacity !== '0';\n");
    script.push_str("  };\n\n");

    // Frameworks override the value property on managed inputs; going
    // through the prototype setter keeps their internal state honest.
    script.push_str("  const __cdSetNativeValue = (element, text) => {\n");
    script.push_str("    const proto = Object.getPrototypeOf(element);\n");
    script.push_str("    const descriptor = Object.getOwnPropertyDescriptor(proto, 'value');\n");
    script.push_str("    if (descriptor && descriptor.set) { descriptor.set.call(element, text); } else { element.value = text; }\n");
    script.push_str("    try { element.setSelectionRange(element.value.length, element.value.length); } catch (_) {}\n");
    script.push_str("  };\n\n");

    script.push_str("  const __cdFireInput = (element) => {\n");
    script.push_str("    element.dispatchEvent(new Event('input', { bubbles: true }));\n");
    script.push_str("    element.dispatchEvent(new Event('change', { bubbles: true }));\n");
    script.push_str("  };\n\n");

    // Many front-ends ignore a bare click; they want the whole
    // pointer/mouse press at real coordinates.
    script.push_str("  const __cdClickSequence = (element) => {\n");
    script.push_str("    const rect = element.getBoundingClientRect();\n");
    script.push_str("    const opts = {\n");
    script.push_str("      bubbles: true,\n");
    script.push_str("      cancelable: true,\n");
    script.push_str("      view: window,\n");
    script.push_str("      clientX: rect.left + rect.width / 2,\n");
    script.push_str("      clientY: rect.top + rect.height / 2,\n");
    script.push_str("    };\n");
    script.push_str("    element.dispatchEvent(new PointerEvent('pointerdown', opts));\n");
    script.push_str("    element.dispatchEvent(new MouseEvent('mousedown', opts));\n");
    script.push_str("    element.dispatchEvent(new PointerEvent('pointerup', opts));\n");
    script.push_str("    element.dispatchEvent(new MouseEvent('mouseup', opts));\n");
    script.push_str("    element.dispatchEvent(new MouseEvent('click', opts));\n");
    script.push_str("  };\n\n");

    // Observability only: flash a marker into the tab title, restoring
    // the original shortly after.
    script.push_str("  const __cdTitleMark = (marker) => {\n");
    script.push_str("    try {\n");
    script.push_str("      const original = document.title;\n");
    script.push_str("      document.title = `${marker} ${original}`;\n");
    script.push_str("      setTimeout(() => { try { document.title = original; } catch (_) {} }, 1500);\n");
    script.push_str("    } catch (_) {}\n");
    script.push_str("  };\n\n");

    script.push_str("  const __cdB64Url = (text) => {\n");
    script.push_str("    const bytes = new TextEncoder().encode(text);\n");
    script.push_str("    let binary = '';\n");
    script.push_str("    for (const byte of bytes) { binary += String.fromCharCode(byte); }\n");
    script.push_str("    return btoa(binary).replace(/\\+/g, '-').replace(/\\//g, '_').replace(/=+$/, '');\n");
    script.push_str("  };\n\n");

    // The navigation never takes effect; the host intercepts and
    // cancels anything under CHANNEL_BASE.
    script.push_str("  const __cdNavigate = (url) => { try { window.location.href = url; } catch (_) {} };\n\n");

    script.push_str("  const __cdEmit = async (payload) => {\n");
    script.push_str("    const encoded = __cdB64Url(JSON.stringify(payload));\n");
    script.push_str("    const chunks = [];\n");
    script.push_str("    for (let i = 0; i < encoded.length; i += MAX_CHUNK_LEN) { chunks.push(encoded.slice(i, i + MAX_CHUNK_LEN)); }\n");
    script.push_str("    __cdNavigate(`${CHANNEL_BASE}/begin?cid=${CID}`);\n");
    script.push_str("    await __cdSleep(15);\n");
    script.push_str("    for (let seq = 0; seq < chunks.length; seq += 1) {\n");
    script.push_str("      __cdNavigate(`${CHANNEL_BASE}/chunk?cid=${CID}&seq=${seq}&data=${chunks[seq]}`);\n");
    script.push_str("      await __cdSleep(15);\n");
    script.push_str("    }\n");
    script.push_str("    __cdNavigate(`${CHANNEL_BASE}/end?cid=${CID}`);\n");
    script.push_str("  };\n\n");

    script.push_str("  const AsyncFunction = Object.getPrototypeOf(async function () {}).constructor;\n\n");

    script.push_str("  async function executeAction(action) {\n");
    script.push_str("    switch (action.type) {\n");
    script.push_str("      case 'fill': {\n");
    script.push_str("        const target = { ...action.target, timeout_ms: action.timeout_ms ?? action.target.timeout_ms };\n");
    script.push_str("        const element = await __cdFind(target);\n");
    script.push_str("        const tag = element.tagName ? element.tagName.toLowerCase() : '';\n");
    script.push_str("        if (tag === 'input' || tag === 'textarea') {\n");
    script.push_str("          element.focus();\n");
    script.push_str("          __cdSetNativeValue(element, action.content);\n");
    script.push_str("        } else if (element.isContentEditable) {\n");
    script.push_str("          element.focus();\n");
    script.push_str("          element.textContent = action.content;\n");
    script.push_str("        } else {\n");
    script.push_str("          throw new Error(`element is not editable: ${action.target.selector}`);\n");
    script.push_str("        }\n");
    script.push_str("        if (action.trigger_events !== false) { __cdFireInput(element); }\n");
    script.push_str("        return { type: action.type, selector: action.target.selector };\n");
    script.push_str("      }\n");
    script.push_str("      case 'click': {\n");
    script.push_str("        const target = { ...action.target, timeout_ms: action.timeout_ms ?? action.target.timeout_ms };\n");
    script.push_str("        const element = await __cdFind(target);\n");
    script.push_str("        if (action.wait_for_visible !== false && !__cdVisible(element)) {\n");
    script.push_str("          throw new Error(`element is not visible: ${action.target.selector}`);\n");
    script.push_str("        }\n");
    script.push_str("        __cdClickSequence(element);\n");
    script.push_str("        return { type: action.type, selector: action.target.selector };\n");
    script.push_str("      }\n");
    script.push_str("      case 'wait': {\n");
    script.push_str("        await __cdSleep(action.duration_ms);\n");
    script.push_str("        return { type: action.type, duration_ms: action.duration_ms };\n");
    script.push_str("      }\n");
    script.push_str("      case 'custom': {\n");
    script.push_str("        const fn = new AsyncFunction(action.script);\n");
    script.push_str("        const value = await fn();\n");
    script.push_str("        return { type: action.type, value: value ?? null };\n");
    script.push_str("      }\n");
    script.push_str("      case 'extract': {\n");
    script.push_str("        const probe = new AsyncFunction(action.extract_script);\n");
    script.push_str(&format!(
        "        const intervalMs = action.poll_interval_ms ?? {DEFAULT_EXTRACT_INTERVAL_MS};\n"
    ));
    script.push_str(&format!(
        "        const timeoutMs = action.timeout_ms ?? {DEFAULT_EXTRACT_TIMEOUT_MS};\n"
    ));
    script.push_str("        const value = await __cdPoll(probe, intervalMs, timeoutMs, `extract timed out after ${timeoutMs}ms`);\n");
    script.push_str("        return { type: action.type, value };\n");
    script.push_str("      }\n");
    script.push_str("      default:\n");
    script.push_str("        throw new Error(`Unsupported action type: ${action.type}`);\n");
    script.push_str("    }\n");
    script.push_str("  }\n\n");

    script.push_str("  const results = [];\n");
    script.push_str("  const startedAt = Date.now();\n");
    script.push_str("  let executed = 0;\n");
    script.push_str("  let failure = null;\n");
    script.push_str("  __cdTitleMark('[cd:run]');\n");
    script.push_str("  try {\n");
    script.push_str("    for (const action of actions) {\n");
    script.push_str("      if (action.delay_ms) { await __cdSleep(action.delay_ms); }\n");
    script.push_str("      const value = await executeAction(action);\n");
    script.push_str("      results.push({ index: executed, kind: action.type, success: true, detail: value ?? null });\n");
    script.push_str("      executed += 1;\n");
    script.push_str("    }\n");
    script.push_str("    __cdTitleMark('[cd:ok]');\n");
    script.push_str("  } catch (error) {\n");
    script.push_str("    failure = error && error.message ? error.message : String(error);\n");
    script.push_str("    results.push({ index: executed, kind: 'error', success: false, detail: failure });\n");
    script.push_str("    __cdTitleMark('[cd:err]');\n");
    script.push_str("  }\n\n");

    script.push_str("  const payload = {\n");
    script.push_str("    success: failure === null,\n");
    script.push_str("    error: failure,\n");
    script.push_str("    duration_ms: Date.now() - startedAt,\n");
    script.push_str("    actions_executed: executed,\n");
    script.push_str("    results,\n");
    script.push_str("  };\n");
    script.push_str("  try { await __cdEmit(payload); } catch (_) {}\n");
    script.push_str("})();\n");

    debug!(
        actions = actions.len(),
        correlation_id = %correlation_id,
        script_bytes = script.len(),
        "compiled injection sequence"
    );

    Ok(script)
}

// ============ Tests ============
