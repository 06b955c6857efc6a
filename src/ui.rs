use uuid::Uuid;

/// Local storage key for the caregiver's display name.
pub const YOUR_NAME_KEY: &str = "babyStats:yourName";

pub fn render_index(room: Uuid) -> String {
    INDEX_HTML
        .replace("{{ROOM}}", &room.to_string())
        .replace("{{NAME_KEY}}", YOUR_NAME_KEY)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <link rel="manifest" href="/manifest.json?name=Baby%20Stats" />
  <title>Baby Stats</title>
  <style>
    :root {
      --bg: #fdf6e3;
      --ink: #2b2a28;
      --tile: #a7dbd8;
      --tile-active: #e0e4cc;
      --accent: #f38630;
      --overlay: rgba(43, 42, 40, 0.7);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      height: 100vh;
      display: flex;
      flex-direction: column;
      background: var(--bg);
      color: var(--ink);
      font-family: "Trebuchet MS", sans-serif;
    }

    input {
      border: none;
      border-bottom: 2px solid var(--tile);
      background: transparent;
      font-size: 1.4rem;
      padding: 10px 14px;
      text-align: center;
    }

    .grid-container {
      position: relative;
      flex: 1;
      display: flex;
      flex-direction: column;
      align-items: center;
      justify-content: center;
    }

    .row {
      display: flex;
    }

    .cell {
      position: relative;
      padding: 6px;
      cursor: pointer;
      user-select: none;
    }

    .cell .contents {
      height: 100%;
      border-radius: 18px;
      background: var(--tile);
      display: flex;
      flex-direction: column;
      align-items: center;
      justify-content: center;
      white-space: pre-line;
      text-align: center;
      font-size: 1.1rem;
      gap: 6px;
    }

    .cell.active .contents {
      background: var(--accent);
      color: white;
    }

    .cell .meta {
      font-size: 0.8rem;
      opacity: 0.8;
    }

    .cell .countdown {
      position: absolute;
      inset: 6px;
      border-radius: 18px;
      background: var(--overlay);
      color: white;
      font-size: 3rem;
      display: none;
      align-items: center;
      justify-content: center;
    }

    .cell.arming .countdown {
      display: flex;
    }

    .grid-overlay {
      position: absolute;
      inset: 0;
      background: var(--overlay);
      color: white;
      display: none;
      flex-direction: column;
      align-items: center;
      justify-content: center;
      gap: 16px;
      font-size: 1.4rem;
    }

    .grid-overlay.visible {
      display: flex;
    }

    button {
      border: none;
      border-radius: 999px;
      padding: 12px 20px;
      font-size: 1rem;
      background: var(--accent);
      color: white;
      cursor: pointer;
    }
  </style>
</head>
<body>
  <input id="child-name" placeholder="Child name" />
  <input id="your-name" placeholder="Your name" />
  <div class="grid-container" id="grid">
    <div class="grid-overlay" id="overlay">
      <span id="overlay-text"></span>
      <button id="request-access" hidden>Request access</button>
    </div>
  </div>
  <script>
    const room = '{{ROOM}}';
    const nameKey = '{{NAME_KEY}}';
    const api = (path) => `/api/baby/${room}${path}`;

    const gridEl = document.getElementById('grid');
    const overlayEl = document.getElementById('overlay');
    const overlayTextEl = document.getElementById('overlay-text');
    const requestEl = document.getElementById('request-access');
    const childNameEl = document.getElementById('child-name');
    const yourNameEl = document.getElementById('your-name');

    let tiles = [];
    let grid = null;
    let denied = false;
    let fastPoll = null;
    const cells = new Map();

    yourNameEl.value = localStorage.getItem(nameKey) || '';

    const post = async (path, body) => {
      const response = await fetch(api(path), {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify(body),
      });
      if (response.status === 403) {
        denied = true;
        checkOverlay();
      }
      return response;
    };

    const checkOverlay = () => {
      let message = '';
      if (!childNameEl.value) {
        message = 'Please enter child name above';
      } else if (!yourNameEl.value) {
        message = 'Please enter your name above';
      } else if (denied) {
        message = 'You do not have write access to this baby';
      }
      overlayTextEl.textContent = message;
      requestEl.hidden = !denied || !yourNameEl.value;
      overlayEl.classList.toggle('visible', Boolean(message));
    };

    const buildGrid = () => {
      gridEl.querySelectorAll('.row').forEach((row) => row.remove());
      let index = 0;
      for (let y = 0; y < grid.rows; y++) {
        const row = document.createElement('div');
        row.className = 'row';
        for (let x = 0; x < grid.columns && index < tiles.length; x++, index++) {
          const cell = cells.get(tiles[index].type);
          cell.style.width = `${grid.cell_width}px`;
          cell.style.height = `${grid.cell_height}px`;
          row.appendChild(cell);
        }
        gridEl.insertBefore(row, overlayEl);
      }
    };

    const rebuildIfNeeded = async () => {
      const width = gridEl.offsetWidth;
      const height = gridEl.offsetHeight;
      const shown = grid ? `&columns=${grid.columns}&rows=${grid.rows}` : '';
      const response = await fetch(api(`/grid?width=${width}&height=${height}${shown}`));
      if (!response.ok) {
        return;
      }
      grid = await response.json();
      if (grid.rebuild) {
        buildGrid();
      } else {
        cells.forEach((cell) => {
          cell.style.width = `${grid.cell_width}px`;
          cell.style.height = `${grid.cell_height}px`;
        });
      }
    };

    const describe = (tile) => {
      const day = tile.stats['24h'];
      const parts = [tile.status_text];
      if (day.count) {
        parts.push(`${day.count} today`);
      }
      if (day.median_interval) {
        parts.push(`every ~${Math.round(day.median_interval / 60)}m`);
      }
      return parts.join(' · ');
    };

    const createCell = (tile) => {
      const cell = document.createElement('div');
      cell.className = 'cell';
      cell.innerHTML = '<div class="contents"><span class="label"></span><span class="meta"></span></div><div class="countdown"></div>';
      cell.querySelector('.label').textContent = tile.description;
      cell.addEventListener('click', async () => {
        await post('/arm', { type: tile.type, sender: yourNameEl.value });
        refresh();
      });
      cells.set(tile.type, cell);
      return cell;
    };

    const refresh = async () => {
      const response = await fetch(api('/tiles'));
      if (!response.ok) {
        return;
      }
      const data = await response.json();
      const first = tiles.length === 0;
      tiles = data.tiles;
      if (first) {
        tiles.forEach(createCell);
        await rebuildIfNeeded();
      }
      if (data.child_name && document.activeElement !== childNameEl) {
        childNameEl.value = data.child_name;
      }
      tiles.forEach((tile) => {
        const cell = cells.get(tile.type);
        cell.classList.toggle('active', tile.active);
        cell.querySelector('.meta').textContent = describe(tile);
        const remaining = data.arming[tile.type];
        cell.classList.toggle('arming', remaining !== undefined);
        cell.querySelector('.countdown').textContent = remaining ?? '';
      });
      const arming = Object.keys(data.arming).length > 0;
      if (arming && !fastPoll) {
        fastPoll = window.setInterval(refresh, 1000);
      } else if (!arming && fastPoll) {
        window.clearInterval(fastPoll);
        fastPoll = null;
      }
      checkOverlay();
    };

    childNameEl.addEventListener('input', () => {
      checkOverlay();
      post('/child_name', { child_name: childNameEl.value, sender: yourNameEl.value });
    });
    yourNameEl.addEventListener('input', () => {
      localStorage.setItem(nameKey, yourNameEl.value);
      denied = false;
      checkOverlay();
    });
    requestEl.addEventListener('click', async () => {
      await post('/access/request', { sender: yourNameEl.value });
      overlayTextEl.textContent = 'Access requested';
    });
    window.addEventListener('resize', rebuildIfNeeded);

    checkOverlay();
    refresh();
    window.setInterval(refresh, 60 * 1000);
  </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_bound_to_its_room() {
        let id = Uuid::new_v4();
        let html = render_index(id);
        assert!(html.contains(&format!("const room = '{id}';")));
        assert!(html.contains("babyStats:yourName"));
        assert!(!html.contains("{{"));
    }
}
